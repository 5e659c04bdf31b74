//! iPinYou CLI Library
//!
//! This crate provides the command-line interface for the iPinYou RTB
//! dataset pipeline, exposing each stage as a subcommand:
//!
//! - **mkdata**: join impressions with clicks into a labeled training log
//! - **mktest**: label test-round logs from their feedback columns
//! - **split**: partition labeled logs by advertiser
//! - **yzx**: build a feature index and emit sparse vectors
//! - **run**: the full pipeline, raw logs to per-advertiser artifacts
//!
//! # Example
//!
//! ```bash
//! # Full pipeline
//! ipinyou run --imp imp.20130606.txt --clk clk.20130606.txt \
//!     --test leaderboard.20130613.txt --output-root out
//!
//! # Individual stages
//! ipinyou mkdata --imp imp.20130606.txt --clk clk.20130606.txt -o train.log.txt
//! ipinyou split --output-root out train.log.txt test.log.txt
//! ipinyou yzx --train-log out/1458/train.log.txt --test-log out/1458/test.log.txt \
//!     --out-dir out/1458
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{MkDataCommand, MkTestCommand, RunCommand, SplitCommand, YzxCommand};

/// iPinYou - RTB auction logs to machine-learning-ready datasets
///
/// Joins impression and click logs, partitions them by advertiser, and
/// rewrites every row into a sparse feature encoding backed by a
/// deterministic feature index.
#[derive(Parser, Debug)]
#[command(name = "ipinyou")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join impressions with clicks into a labeled training log
    #[command(name = "mkdata")]
    MkData(MkDataCommand),

    /// Label test-round logs from their trailing feedback columns
    #[command(name = "mktest")]
    MkTest(MkTestCommand),

    /// Partition labeled logs into per-advertiser directories
    Split(SplitCommand),

    /// Build a feature index from a training log and emit yzx vectors
    Yzx(YzxCommand),

    /// Run the full pipeline: label, split, index, vectorize
    Run(RunCommand),
}
