//! MkData Command Implementation
//!
//! Joins raw impression logs against click logs and writes the labeled
//! training log: `click`, `weekday`, `hour`, then every raw column, with
//! empty fields normalized to `null` and the user-agent column collapsed
//! to its `os_browser` signature.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ipinyou_data::join::{ClickLookup, Labeler};
use ipinyou_data::loader::open_concat;
use ipinyou_data::ua::KeywordNormalizer;
use tracing::info;

/// Join impressions with clicks into a labeled training log
///
/// # Example
///
/// ```bash
/// ipinyou mkdata \
///     --imp imp.20130606.txt --imp imp.20130607.txt \
///     --clk clk.20130606.txt --clk clk.20130607.txt \
///     -o train.log.txt
/// ```
#[derive(Args, Debug, Clone)]
pub struct MkDataCommand {
    /// Schema file (whitespace-separated column names); the built-in
    /// iPinYou layout is used when omitted
    #[arg(long, short = 's', env = "IPINYOU_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Raw impression log files, in round order
    #[arg(long = "imp", required = true)]
    pub impressions: Vec<PathBuf>,

    /// Raw click log files
    #[arg(long = "clk")]
    pub clicks: Vec<PathBuf>,

    /// Output labeled log file
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl MkDataCommand {
    /// Executes the mkdata command.
    pub fn run(&self) -> Result<()> {
        let schema = super::load_schema(&self.schema)?;

        let clicks = ClickLookup::from_files(&self.clicks, &schema)
            .context("failed to build click lookup")?;
        let input = open_concat(&self.impressions)?;
        let mut out = BufWriter::new(
            File::create(&self.output)
                .with_context(|| format!("failed to create {}", self.output.display()))?,
        );

        let labeler = Labeler::new(&schema, KeywordNormalizer::new());
        let stats = labeler.label_impressions(&clicks, input, &mut out)?;
        out.flush()?;

        info!(
            output = %self.output.display(),
            labeled = stats.labeled,
            clicked = stats.clicked,
            skipped = stats.skipped,
            "labeled training log written"
        );
        Ok(())
    }
}
