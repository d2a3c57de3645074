//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod context;
pub mod login;
pub mod logout;
pub mod register;
pub mod status;
pub mod whoami;

pub use context::CommandContext;

use crate::output::OutputFormat;

/// QmOp CLI - companion for the Quartermaster logistics platform
#[derive(Parser, Debug)]
#[command(name = "qmop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(
        long,
        global = true,
        env = "QMOP_FORMAT",
        default_value = "table",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "QMOP_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "QMOP_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to the platform (presents your client certificate)
    Login,

    /// Log out and clear the stored session
    Logout {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show session and configuration status
    Status,

    /// Show the profile of the authenticated account
    Whoami,

    /// Submit an account registration request
    Register {
        /// Given name
        #[arg(long)]
        first_name: String,

        /// Family name
        #[arg(long)]
        last_name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// Rank or grade
        #[arg(long)]
        rank: String,

        /// Directorate assignment
        #[arg(long)]
        jdir: String,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Display version information
    Version,
}
