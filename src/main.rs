//! QmOp CLI - companion for the Quartermaster logistics platform

use clap::{CommandFactory, Parser};

mod cli;
mod client;
mod config;
mod error;
mod output;

use cli::{Cli, Commands};
use client::Registration;
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Login => cli::login::run(cli.format, cli.config.as_deref()).await,
        Commands::Logout { yes } => cli::logout::run(yes, cli.format, cli.config.as_deref()).await,
        Commands::Status => cli::status::run(cli.config.as_deref()),
        Commands::Whoami => cli::whoami::run(cli.format, cli.config.as_deref()).await,
        Commands::Register {
            first_name,
            last_name,
            email,
            phone,
            rank,
            jdir,
        } => {
            let registration = Registration {
                first_name,
                last_name,
                email,
                phone,
                rank,
                jdir,
            };
            cli::register::run(registration, cli.format, cli.config.as_deref()).await
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "qmop", &mut std::io::stdout());
            Ok(())
        }
        Commands::Version => {
            println!("qmop version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
