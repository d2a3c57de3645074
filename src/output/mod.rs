//! Output formatting for CLI commands

use clap::ValueEnum;

use crate::client::AuthUser;
use crate::error::Result;

pub mod table;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Machine-readable JSON
    Json,
}

/// Print an account profile in the requested format
pub fn print_user(user: &AuthUser, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", table::render_user(user)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(user)?),
    }
    Ok(())
}
