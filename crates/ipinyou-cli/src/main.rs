//! iPinYou CLI - Command-line interface for the RTB dataset pipeline.
//!
//! This binary turns raw iPinYou auction logs into per-advertiser
//! machine-learning datasets: labeled logs, feature indexes, and sparse
//! yzx vector files.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ipinyou_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ipinyou=info".parse()?))
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Dispatch to appropriate subcommand
    match cli.command {
        Commands::MkData(cmd) => cmd.run()?,
        Commands::MkTest(cmd) => cmd.run()?,
        Commands::Split(cmd) => cmd.run()?,
        Commands::Yzx(cmd) => cmd.run()?,
        Commands::Run(cmd) => cmd.run()?,
    }

    info!("done");
    Ok(())
}
