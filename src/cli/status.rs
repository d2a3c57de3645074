//! Status command implementation

use colored::Colorize;

use crate::client::claims;
use crate::config::Config;
use crate::error::Result;

/// Run the status command to display session and configuration status.
///
/// Purely local: reads the config file, never the network.
pub fn run(config_path: Option<&str>) -> Result<()> {
    println!("{}\n", "QmOp Session Status".bold());

    let path = Config::resolve_path(config_path)?;

    let config = match Config::load_at(config_path) {
        Ok(config) => config,
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!("Run {} to create one.", "qmop login".cyan());
            return Ok(());
        }
    };

    println!("Config file: {}", path.display().to_string().cyan());

    if let Some(email) = &config.email {
        println!("Account:     {}", email.bold());
    }

    match &config.token {
        Some(token) => match claims::expires_at(token) {
            Some(expires_at) => {
                let now = chrono::Utc::now();
                if expires_at <= now {
                    println!(
                        "{} Bearer token expired (will refresh on next command)",
                        "⚠".yellow()
                    );
                } else {
                    let remaining = expires_at.signed_duration_since(now);
                    println!(
                        "{} Bearer token valid (expires in {}h {}m)",
                        "✓".green(),
                        remaining.num_hours(),
                        remaining.num_minutes() % 60
                    );
                }
            }
            None => {
                println!(
                    "{} Bearer token undecodable (treated as expired)",
                    "⚠".yellow()
                );
            }
        },
        None => {
            println!("{} No bearer token stored", "○".dimmed());
        }
    }

    if config.refresh_token.is_some() {
        println!("{} Refresh token present", "✓".green());
    } else {
        println!("{} No refresh token stored", "✗".red());
        println!("  → Run 'qmop login' to authenticate");
    }

    if let Some(host) = &config.api_host {
        println!("{} Custom API host: {}", "○".dimmed(), host.cyan());
    }

    println!();
    Ok(())
}
