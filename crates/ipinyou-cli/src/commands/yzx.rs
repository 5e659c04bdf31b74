//! Yzx Command Implementation
//!
//! Builds the feature index from a labeled training log and rewrites the
//! training (and optionally test) rows into sparse yzx vectors. The
//! index is always built from the training log alone; test rows never
//! contribute entries, their unseen values resolve to the reserved
//! `other` buckets or are omitted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ipinyou_data::index::FeatureIndexer;
use ipinyou_data::ua::KeywordNormalizer;
use ipinyou_data::vectorize::Vectorizer;
use tracing::info;

/// Build a feature index from a training log and emit yzx vectors
///
/// # Example
///
/// ```bash
/// ipinyou yzx \
///     --train-log out/1458/train.log.txt \
///     --test-log out/1458/test.log.txt \
///     --out-dir out/1458
/// ```
#[derive(Args, Debug, Clone)]
pub struct YzxCommand {
    /// Labeled training log (the only source of index entries)
    #[arg(long)]
    pub train_log: PathBuf,

    /// Labeled test log to vectorize with the same index
    #[arg(long)]
    pub test_log: Option<PathBuf>,

    /// Directory receiving featindex.txt, train.yzx.txt, and test.yzx.txt
    #[arg(long, short = 'o')]
    pub out_dir: PathBuf,
}

impl YzxCommand {
    /// Executes the yzx command.
    pub fn run(&self) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;

        let normalizer = KeywordNormalizer::new();
        let index = FeatureIndexer::new(normalizer)
            .index_file(&self.train_log)
            .context("feature indexing failed")?;
        index.save(self.out_dir.join("featindex.txt"))?;
        info!(features = index.len(), "feature index written");

        let vectorizer = Vectorizer::new(&index, normalizer);
        let train_stats =
            vectorizer.vectorize_file(&self.train_log, self.out_dir.join("train.yzx.txt"))?;
        info!(rows = train_stats.rows, "train vectors written");

        if let Some(test_log) = &self.test_log {
            let test_stats =
                vectorizer.vectorize_file(test_log, self.out_dir.join("test.yzx.txt"))?;
            info!(rows = test_stats.rows, "test vectors written");
        }
        Ok(())
    }
}
