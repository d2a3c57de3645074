//! Logout command implementation

use colored::Colorize;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;

use crate::cli::CommandContext;
use crate::client::QuartermasterApi;
use crate::error::Result;
use crate::output::OutputFormat;

/// Run the logout command.
///
/// The platform is notified best-effort; the local session is cleared either
/// way.
pub async fn run(yes: bool, format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let ctx = CommandContext::new(format, config_path)?;

    if !ctx.config.has_session() {
        println!("Not logged in.");
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Log out and clear the stored session?")
            .default(true)
            .interact()?;
        if !confirmed {
            return Ok(());
        }
    }

    ctx.client.logout().await?;

    println!("{} Logged out.", "✓".green());
    Ok(())
}
