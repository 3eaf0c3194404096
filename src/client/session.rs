//! Signed-in state, persisted under two keys and published to subscribers.

use crate::models::UserProfile;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::watch;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Key/value persistence for client state.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path(key);
        fs::write(&path, value).with_context(|| format!("failed to write {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

pub type SessionReceiver = watch::Receiver<Option<Session>>;

/// Single writer for the session; everything else subscribes.
pub struct SessionStore<S: Storage> {
    storage: S,
    state: watch::Sender<Option<Session>>,
}

impl<S: Storage> SessionStore<S> {
    /// Loads whatever session `storage` holds. Anything unreadable is
    /// removed and the store starts signed out.
    pub fn open(mut storage: S) -> Self {
        let session = match load(&storage) {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(error = %err, "discarding unreadable session");
                for key in [TOKEN_KEY, USER_KEY] {
                    if let Err(err) = storage.remove(key) {
                        tracing::warn!(key, error = %err, "failed to remove session key");
                    }
                }
                None
            }
        };
        let (state, _) = watch::channel(session);
        SessionStore { storage, state }
    }

    pub fn get(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn subscribe(&self) -> SessionReceiver {
        self.state.subscribe()
    }

    pub fn set(&mut self, session: Session) -> Result<()> {
        let token = serde_json::to_string(&session.token)?;
        let user = serde_json::to_string(&session.user)?;
        self.storage.set(TOKEN_KEY, &token)?;
        if let Err(err) = self.storage.set(USER_KEY, &user) {
            if let Err(rollback) = self.storage.remove(TOKEN_KEY) {
                tracing::warn!(key = TOKEN_KEY, error = %rollback, "failed to roll back session key");
                return Err(err.context(format!("token left behind: {rollback:#}")));
            }
            return Err(err);
        }
        tracing::info!(user = %session.user.email, "signed in");
        self.state.send_replace(Some(session));
        Ok(())
    }

    /// Removes both keys and publishes the signed-out state, even when a
    /// removal fails.
    pub fn clear(&mut self) -> Result<()> {
        let token = self.storage.remove(TOKEN_KEY);
        let user = self.storage.remove(USER_KEY);
        if self.state.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
        token.and(user)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn load<S: Storage>(storage: &S) -> Result<Option<Session>> {
    let token = storage.get(TOKEN_KEY)?;
    let user = storage.get(USER_KEY)?;
    match (token, user) {
        (None, None) => Ok(None),
        (Some(token), Some(user)) => {
            let token: String = serde_json::from_str(&token).context("token is not JSON")?;
            let user: UserProfile = serde_json::from_str(&user).context("user is not JSON")?;
            anyhow::ensure!(!token.is_empty(), "empty token");
            Ok(Some(Session { token, user }))
        }
        _ => anyhow::bail!("only one of token and user is stored"),
    }
}
