//! Configuration management for QmOp
//!
//! The config file doubles as the durable session store: the bearer token and
//! refresh token live in two named slots here. Absence of either slot means
//! "unauthenticated".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Platform API host override (defaults to production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,

    /// Bearer token for the current session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Refresh token paired with the bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Email of the account the session belongs to (display only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".qmop").join("config.yaml"))
    }

    /// Resolve the config path from an explicit override, the `QMOP_CONFIG`
    /// environment variable, or the default location (in that order).
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("QMOP_CONFIG") {
            return Ok(PathBuf::from(p));
        }
        Self::default_path()
    }

    /// Load configuration, honoring the path override
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(path)?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Save configuration, honoring the path override
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // The session tokens are credentials; keep the file private on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Whether both session slots are populated
    pub fn has_session(&self) -> bool {
        self.token.is_some() && self.refresh_token.is_some()
    }

    /// Drop both session slots together. Partial clearing is never valid: a
    /// bearer token without its refresh token is unrecoverable.
    pub fn clear_session(&mut self) {
        self.token = None;
        self.refresh_token = None;
        self.email = None;
    }
}
