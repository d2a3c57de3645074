//! Command execution context
//!
//! Provides a unified context for command execution, eliminating boilerplate
//! for config loading and client construction.

use std::sync::Arc;

use crate::client::{FileSessionStore, QuartermasterClient};
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputFormat;

/// Context for command execution containing config, client, and runtime
/// options.
pub struct CommandContext {
    /// Loaded configuration (defaults when no file exists yet)
    pub config: Config,
    /// Authenticated API client with the file-backed session store injected
    pub client: Arc<QuartermasterClient>,
    /// Output format preference
    pub format: OutputFormat,
}

impl CommandContext {
    /// Create a new command context.
    ///
    /// The config file not existing yet is fine: `login` creates it. The API
    /// host is resolved from `QMOP_API_HOST`, then the config file, then the
    /// production default.
    pub fn new(format: OutputFormat, config_path: Option<&str>) -> Result<Self> {
        let config = Config::load_at(config_path).unwrap_or_default();

        let api_host = std::env::var("QMOP_API_HOST")
            .ok()
            .or_else(|| config.api_host.clone());

        let session = Arc::new(FileSessionStore::new(config_path.map(str::to_string)));
        let client = Arc::new(QuartermasterClient::with_host(session, api_host)?);

        Ok(Self {
            config,
            client,
            format,
        })
    }
}
