//! MkTest Command Implementation
//!
//! Labels test-round logs. Test rounds ship no separate click log;
//! instead each row carries trailing `nclick`/`nconversation` feedback
//! columns, and the click label is derived from `nclick`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ipinyou_data::join::Labeler;
use ipinyou_data::loader::open_concat;
use ipinyou_data::ua::KeywordNormalizer;
use tracing::info;

/// Label test-round logs from their trailing feedback columns
#[derive(Args, Debug, Clone)]
pub struct MkTestCommand {
    /// Schema file for the raw columns (feedback columns are implied);
    /// the built-in iPinYou layout is used when omitted
    #[arg(long, short = 's', env = "IPINYOU_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Raw test log files, in round order
    #[arg(long = "test", required = true)]
    pub tests: Vec<PathBuf>,

    /// Output labeled log file
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl MkTestCommand {
    /// Executes the mktest command.
    pub fn run(&self) -> Result<()> {
        let schema = super::load_schema(&self.schema)?;

        let input = open_concat(&self.tests)?;
        let mut out = BufWriter::new(
            File::create(&self.output)
                .with_context(|| format!("failed to create {}", self.output.display()))?,
        );

        let labeler = Labeler::new(&schema, KeywordNormalizer::new());
        let stats = labeler.label_test(input, &mut out)?;
        out.flush()?;

        info!(
            output = %self.output.display(),
            labeled = stats.labeled,
            clicked = stats.clicked,
            skipped = stats.skipped,
            "labeled test log written"
        );
        Ok(())
    }
}
