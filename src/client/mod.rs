//! Reader-side state: the persisted session, the chat panel, the chapter
//! transform toggles and the signup flow. Every type here is owned by a
//! single task and changes only through `&mut self`.

pub mod auth;
pub mod chapter_view;
pub mod chat;
pub mod header;
pub mod session;

/// Tag for one outstanding request. A completion whose ticket no longer
/// matches its slot is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub(crate) struct TicketCounter {
    next: u64,
}

impl TicketCounter {
    pub(crate) fn issue(&mut self) -> Ticket {
        self.next += 1;
        Ticket(self.next)
    }
}

/// What happened to a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The result was applied to the visible state.
    Applied,
    /// The request failed; a notice is now showing.
    Failed,
    /// The request had been abandoned; its result was ignored.
    Stale,
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::ApiError;
    use crate::models::{
        AuthResponse, ChatRequest, ChatResponse, LoginRequest, PersonalizeRequest,
        PersonalizeResponse, SignupRequest, Source, TranslateRequest, TranslateResponse,
        UserProfile,
    };
    use crate::services::backend::Backend;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Failure {
        Status(u16),
        Offline,
    }

    /// In-memory backend that records every request it receives.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub(crate) asks: Mutex<Vec<ChatRequest>>,
        pub(crate) translations: Mutex<Vec<TranslateRequest>>,
        pub(crate) personalizations: Mutex<Vec<PersonalizeRequest>>,
        pub(crate) signups: Mutex<Vec<SignupRequest>>,
        pub(crate) logins: Mutex<Vec<LoginRequest>>,
        failure: Mutex<Option<Failure>>,
    }

    impl RecordingBackend {
        pub(crate) fn failing(failure: Failure) -> Self {
            let backend = Self::default();
            backend.fail_with(Some(failure));
            backend
        }

        pub(crate) fn fail_with(&self, failure: Option<Failure>) {
            *self.failure.lock().unwrap() = failure;
        }

        pub(crate) fn calls(&self) -> usize {
            self.asks.lock().unwrap().len()
                + self.translations.lock().unwrap().len()
                + self.personalizations.lock().unwrap().len()
                + self.signups.lock().unwrap().len()
                + self.logins.lock().unwrap().len()
        }

        fn check(&self) -> Result<(), ApiError> {
            match *self.failure.lock().unwrap() {
                None => Ok(()),
                Some(Failure::Status(status)) => Err(ApiError::Upstream {
                    status,
                    body: r#"{"detail":"backend unavailable"}"#.to_string(),
                }),
                Some(Failure::Offline) => Err(ApiError::Connection("refused".to_string())),
            }
        }

        fn profile(name: &str, email: &str) -> UserProfile {
            UserProfile {
                id: "u-42".into(),
                email: email.into(),
                name: name.into(),
                programming_experience: "beginner".into(),
                hardware_experience: "none".into(),
                primary_interest: "all".into(),
            }
        }
    }

    impl Backend for RecordingBackend {
        async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
            let n = {
                let mut asks = self.asks.lock().unwrap();
                asks.push(request.clone());
                asks.len()
            };
            self.check()?;
            Ok(ChatResponse {
                message_id: Some(format!("a-{n}")),
                answer: format!("Answer to: {}", request.question),
                sources: Some(vec![Source {
                    chapter: "1.2".into(),
                    title: "ROS 2 Architecture".into(),
                    relevance: 0.9,
                }]),
            })
        }

        async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ApiError> {
            self.signups.lock().unwrap().push(request.clone());
            self.check()?;
            let mut user = Self::profile(&request.name, &request.email);
            user.programming_experience = request.programming_experience.clone();
            user.hardware_experience = request.hardware_experience.clone();
            user.primary_interest = request.primary_interest.clone();
            Ok(AuthResponse {
                token: "signup-token".into(),
                user,
                message: Some("User registered successfully".into()),
            })
        }

        async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
            self.logins.lock().unwrap().push(request.clone());
            self.check()?;
            Ok(AuthResponse {
                token: "login-token".into(),
                user: Self::profile("Returning Reader", &request.email),
                message: None,
            })
        }

        async fn personalize(
            &self,
            request: &PersonalizeRequest,
        ) -> Result<PersonalizeResponse, ApiError> {
            self.personalizations.lock().unwrap().push(request.clone());
            self.check()?;
            Ok(PersonalizeResponse {
                personalized_content: format!("[{}] {}", request.user_level, request.content),
            })
        }

        async fn translate(
            &self,
            request: &TranslateRequest,
        ) -> Result<TranslateResponse, ApiError> {
            self.translations.lock().unwrap().push(request.clone());
            self.check()?;
            Ok(TranslateResponse {
                translated_content: format!("[{}] {}", request.target_language, request.content),
            })
        }
    }
}
