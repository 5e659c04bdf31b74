//! End-of-run reporting.
//!
//! Every stage keeps its own counters while streaming; this module
//! aggregates them into one [`RunReport`] written as `report.json` at the
//! output root. Recoverable problems (malformed lines, dropped rows)
//! never abort a batch — they end up here instead.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::join::LabelStats;
use crate::split::SplitStats;
use crate::vectorize::VectorStats;

/// Per-advertiser artifact summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    /// The advertiser id this partition holds.
    pub advertiser: String,
    /// Entries in the partition's feature index.
    pub features: usize,
    /// Vectorization counters for `train.yzx.txt`.
    pub train: VectorStats,
    /// Vectorization counters for `test.yzx.txt`.
    pub test: VectorStats,
}

/// The aggregated end-of-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Labeling counters for the training impressions.
    pub train_labeling: LabelStats,
    /// Labeling counters for the test logs.
    pub test_labeling: LabelStats,
    /// Split counters for the labeled training file.
    pub train_split: SplitStats,
    /// Split counters for the labeled test file.
    pub test_split: SplitStats,
    /// One entry per materialized advertiser partition, in first-seen order.
    pub partitions: Vec<PartitionReport>,
}

impl RunReport {
    /// Total rows labeled across train and test.
    pub fn labeled_rows(&self) -> u64 {
        self.train_labeling.labeled + self.test_labeling.labeled
    }

    /// Total recoverable skips and drops across all stages.
    pub fn skipped_rows(&self) -> u64 {
        self.train_labeling.skipped
            + self.test_labeling.skipped
            + self.train_split.dropped
            + self.test_split.dropped
            + self
                .partitions
                .iter()
                .map(|p| p.train.skipped + p.test.skipped)
                .sum::<u64>()
    }

    /// Writes the report as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}
