//! Durable session storage for the authenticated client.
//!
//! The client owns the persisted token pair exclusively and reaches it only
//! through this trait, so tests can swap in an in-memory store and the
//! concrete file layout stays a config concern.

use crate::config::Config;
use crate::error::Result;

/// A bearer token and the refresh token it was issued with.
///
/// The two always travel together: storing or clearing one without the other
/// would leave an unrecoverable half-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub refresh_token: String,
}

/// Storage backend for the session token pair.
pub trait SessionStore: Send + Sync {
    /// Load the stored pair. `None` means unauthenticated — a store never
    /// returns a credential with only one slot populated.
    fn load(&self) -> Option<Credential>;

    /// Replace both slots in a single write.
    fn store(&self, credential: &Credential) -> Result<()>;

    /// Drop both slots.
    fn clear(&self) -> Result<()>;
}

/// Session store backed by the QmOp config file.
pub struct FileSessionStore {
    config_path: Option<String>,
}

impl FileSessionStore {
    pub fn new(config_path: Option<String>) -> Self {
        Self { config_path }
    }

    fn path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Credential> {
        let config = Config::load_at(self.path()).ok()?;
        match (config.token, config.refresh_token) {
            (Some(token), Some(refresh_token)) => Some(Credential {
                token,
                refresh_token,
            }),
            _ => None,
        }
    }

    fn store(&self, credential: &Credential) -> Result<()> {
        let mut config = Config::load_at(self.path()).unwrap_or_default();
        config.token = Some(credential.token.clone());
        config.refresh_token = Some(credential.refresh_token.clone());
        config.save_at(self.path())
    }

    fn clear(&self) -> Result<()> {
        let mut config = match Config::load_at(self.path()) {
            Ok(config) => config,
            // Nothing persisted, nothing to clear
            Err(_) => return Ok(()),
        };
        config.clear_session();
        config.save_at(self.path())
    }
}

/// In-memory store for tests.
#[cfg(test)]
pub struct MemorySessionStore {
    credential: std::sync::Mutex<Option<Credential>>,
}

#[cfg(test)]
impl MemorySessionStore {
    pub fn empty() -> Self {
        Self {
            credential: std::sync::Mutex::new(None),
        }
    }

    pub fn with(token: &str, refresh_token: &str) -> Self {
        Self {
            credential: std::sync::Mutex::new(Some(Credential {
                token: token.to_string(),
                refresh_token: refresh_token.to_string(),
            })),
        }
    }
}

#[cfg(test)]
impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Credential> {
        self.credential.lock().unwrap().clone()
    }

    fn store(&self, credential: &Credential) -> Result<()> {
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.lock().unwrap() = None;
        Ok(())
    }
}
