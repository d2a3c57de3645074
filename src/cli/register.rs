//! Register command implementation

use colored::Colorize;

use crate::cli::CommandContext;
use crate::client::{QuartermasterApi, Registration};
use crate::error::Result;
use crate::output::OutputFormat;

/// Run the register command
pub async fn run(
    registration: Registration,
    format: OutputFormat,
    config_path: Option<&str>,
) -> Result<()> {
    let ctx = CommandContext::new(format, config_path)?;

    ctx.client.register(&registration).await?;

    println!(
        "{} Registration submitted for {}",
        "✓".green(),
        registration.email.bold()
    );
    println!("  You will be notified once an administrator approves the account.");

    Ok(())
}
