//! Split Command Implementation
//!
//! Partitions labeled log files into one directory per advertiser under
//! the output root. The advertiser column is located by name in each
//! file's header; partition files keep the input file's name, so
//! splitting `train.log.txt` and then `test.log.txt` gives each
//! advertiser both subsets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ipinyou_data::split::AdvertiserSplitter;
use tracing::info;

/// Partition labeled logs into per-advertiser directories
#[derive(Args, Debug, Clone)]
pub struct SplitCommand {
    /// Root directory for the advertiser partitions
    #[arg(long, short = 'o', env = "IPINYOU_OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// Cap on the number of advertiser partitions (first-seen order)
    #[arg(long)]
    pub advertiser_limit: Option<usize>,

    /// Labeled input files to split, in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl SplitCommand {
    /// Executes the split command.
    pub fn run(&self) -> Result<()> {
        let mut splitter = AdvertiserSplitter::new(&self.output_root, self.advertiser_limit);
        for input in &self.inputs {
            let stats = splitter
                .split_file(input)
                .with_context(|| format!("failed to split {}", input.display()))?;
            info!(
                input = %input.display(),
                written = stats.written,
                dropped = stats.dropped,
                "split"
            );
        }
        info!(
            advertisers = splitter.advertisers().len(),
            root = %self.output_root.display(),
            "partitions written"
        );
        Ok(())
    }
}
