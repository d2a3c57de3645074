//! Whoami command implementation

use crate::cli::CommandContext;
use crate::client::QuartermasterApi;
use crate::error::Result;
use crate::output::{self, OutputFormat};

/// Run the whoami command
pub async fn run(format: OutputFormat, config_path: Option<&str>) -> Result<()> {
    let ctx = CommandContext::new(format, config_path)?;
    let user = ctx.client.me().await?;
    output::print_user(&user, ctx.format)
}
