//! hhlink: link hh.ru accounts and act on them from the command line.
//!
//! Configuration comes from `~/.config/hhlink/config.json`, then `HH_*`
//! environment variables (a `.env` file is honored), then the OS keychain
//! for the client secret.

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (log_dir, default_filter) = match &cli.command {
        Command::Serve { log_dir, .. } => (log_dir.clone(), "info"),
        _ => (None, "warn"),
    };
    let _guard = logging::init_tracing(log_dir.as_deref(), default_filter);
    info!("hhlink {} starting", env!("CARGO_PKG_VERSION"));

    commands::run(cli).await
}
