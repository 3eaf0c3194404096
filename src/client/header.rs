use super::session::SessionReceiver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    SignedIn { name: String, email: String },
    SignedOut,
}

/// Identity shown in the page chrome, derived from the live session.
pub struct Header {
    session: SessionReceiver,
}

impl Header {
    pub fn new(session: SessionReceiver) -> Self {
        Header { session }
    }

    pub fn identity(&self) -> Identity {
        match &*self.session.borrow() {
            Some(session) => Identity::SignedIn {
                name: session.user.name.clone(),
                email: session.user.email.clone(),
            },
            None => Identity::SignedOut,
        }
    }

    pub fn label(&self) -> String {
        match self.identity() {
            Identity::SignedIn { name, .. } => name,
            Identity::SignedOut => "Sign In".to_string(),
        }
    }
}
