//! Login command implementation

use colored::Colorize;

use crate::cli::CommandContext;
use crate::client::QuartermasterApi;
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputFormat;

/// Run the login command.
///
/// The platform authenticates the TLS client certificate presented during the
/// handshake; on success the returned token pair is persisted for later
/// commands.
pub async fn run(format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let ctx = CommandContext::new(format, config_path)?;

    println!("{}", "Authenticating with the platform...".cyan());
    let user = ctx.client.login().await?;

    // The client already persisted the token pair; record the identity for
    // `qmop status` display.
    let mut config = Config::load_at(config_path).unwrap_or_default();
    config.email = Some(user.email.clone());
    config.save_at(config_path)?;

    println!(
        "{} Logged in as {} {} <{}>",
        "✓".green(),
        user.first_name.bold(),
        user.last_name.bold(),
        user.email
    );

    if let Some(rank) = &user.rank {
        println!("  Rank: {rank}");
    }
    if let Some(jdir) = &user.jdir {
        println!("  Directorate: {jdir}");
    }

    Ok(())
}
