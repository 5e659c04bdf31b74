//! Full pipeline orchestration.
//!
//! Runs the stages in their required order: label the training
//! impressions against the click logs, label the test logs, split both by
//! advertiser, then index and vectorize each partition. Indexing a
//! partition strictly precedes vectorizing it; partitions themselves are
//! mutually independent and processed in parallel.
//!
//! The feature index scope is **per advertiser**: each partition builds
//! its own `featindex.txt` from its own training rows and ids are only
//! meaningful within that partition. A global index is equally valid
//! structurally, but byte-compatibility with any existing downstream
//! consumer depends on matching the scope it was built with.
//!
//! All stages are pure functions of their inputs; a failed run is simply
//! re-executed from the raw logs. Missing inputs abort before any output
//! is written.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DataError, Result};
use crate::index::FeatureIndexer;
use crate::join::{ClickLookup, Labeler};
use crate::loader::open_concat;
use crate::report::{PartitionReport, RunReport};
use crate::schema::LogSchema;
use crate::split::AdvertiserSplitter;
use crate::ua::KeywordNormalizer;
use crate::vectorize::Vectorizer;

/// Labeled training log artifact name.
pub const TRAIN_LOG: &str = "train.log.txt";
/// Labeled test log artifact name.
pub const TEST_LOG: &str = "test.log.txt";
/// Feature index artifact name.
pub const FEAT_INDEX: &str = "featindex.txt";
/// Sparse training vectors artifact name.
pub const TRAIN_YZX: &str = "train.yzx.txt";
/// Sparse test vectors artifact name.
pub const TEST_YZX: &str = "test.yzx.txt";
/// Run report artifact name.
pub const REPORT: &str = "report.json";

/// Configuration for one full pipeline run.
///
/// Loadable from a JSON file or assembled from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path to a whitespace-separated schema file; the built-in iPinYou
    /// schema is used when absent.
    #[serde(default)]
    pub schema: Option<PathBuf>,
    /// Raw impression logs for the training rounds, in order.
    pub train_impressions: Vec<PathBuf>,
    /// Raw click logs for the training rounds.
    #[serde(default)]
    pub train_clicks: Vec<PathBuf>,
    /// Raw test-round logs (with trailing feedback columns).
    #[serde(default)]
    pub test_logs: Vec<PathBuf>,
    /// Root directory for all artifacts.
    pub output_root: PathBuf,
    /// Cap on the number of advertiser partitions; `None` keeps all.
    #[serde(default)]
    pub advertiser_limit: Option<usize>,
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    fn validate(&self) -> Result<()> {
        for path in self
            .train_impressions
            .iter()
            .chain(&self.train_clicks)
            .chain(&self.test_logs)
        {
            if !path.is_file() {
                return Err(DataError::MissingInput { path: path.clone() });
            }
        }
        if self.train_impressions.is_empty() {
            return Err(DataError::MissingInput {
                path: PathBuf::from("<train impressions>"),
            });
        }
        Ok(())
    }
}

/// Executes the full pipeline described by `config`.
///
/// Artifacts land under `config.output_root`: the global labeled files,
/// one directory per admitted advertiser with its five partition
/// artifacts, and the aggregated `report.json`.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunReport> {
    // Fail on any missing input before creating output directories, so a
    // bad invocation never leaves a partial artifact tree.
    config.validate()?;
    let schema = match &config.schema {
        Some(path) => LogSchema::from_file(path)?,
        None => LogSchema::ipinyou(),
    };
    fs::create_dir_all(&config.output_root)?;

    let normalizer = KeywordNormalizer::new();
    let labeler = Labeler::new(&schema, normalizer);
    let mut report = RunReport::default();

    // Stage 1: join and label the training impressions.
    let clicks = ClickLookup::from_files(&config.train_clicks, &schema)?;
    let train_log = config.output_root.join(TRAIN_LOG);
    {
        let input = open_concat(&config.train_impressions)?;
        let mut out = BufWriter::new(File::create(&train_log)?);
        report.train_labeling = labeler.label_impressions(&clicks, input, &mut out)?;
        out.flush()?;
    }
    info!(
        labeled = report.train_labeling.labeled,
        clicked = report.train_labeling.clicked,
        skipped = report.train_labeling.skipped,
        "training impressions labeled"
    );

    // Stage 2: label the test rounds from their feedback columns.
    let test_log = config.output_root.join(TEST_LOG);
    if !config.test_logs.is_empty() {
        let input = open_concat(&config.test_logs)?;
        let mut out = BufWriter::new(File::create(&test_log)?);
        report.test_labeling = labeler.label_test(input, &mut out)?;
        out.flush()?;
    }

    // Stage 3: partition by advertiser. Train goes first so the
    // first-seen order (and the partition limit) is decided by the
    // training data.
    let mut splitter = AdvertiserSplitter::new(&config.output_root, config.advertiser_limit);
    report.train_split = splitter.split_file(&train_log)?;
    if test_log.is_file() {
        report.test_split = splitter.split_file(&test_log)?;
    }

    // Stage 4: per-partition feature index, then vectors. Partitions are
    // independent; the index is built before any vectorization of its
    // partition begins.
    let advertisers: Vec<String> = splitter.advertisers().to_vec();
    report.partitions = advertisers
        .par_iter()
        .map(|advertiser| process_partition(&config.output_root, advertiser, normalizer))
        .collect::<Result<Vec<_>>>()?;

    report.save(config.output_root.join(REPORT))?;
    info!(
        advertisers = report.partitions.len(),
        labeled = report.labeled_rows(),
        skipped = report.skipped_rows(),
        "pipeline finished"
    );
    Ok(report)
}

/// Indexes and vectorizes one advertiser partition.
fn process_partition(
    out_root: &Path,
    advertiser: &str,
    normalizer: KeywordNormalizer,
) -> Result<PartitionReport> {
    let dir = out_root.join(advertiser);
    let train = dir.join(TRAIN_LOG);
    let mut partition = PartitionReport {
        advertiser: advertiser.to_string(),
        ..Default::default()
    };

    if !train.is_file() {
        // Advertiser appeared only in test rounds; without training rows
        // there is nothing to index against.
        warn!(advertiser, "no training rows; partition left unvectorized");
        return Ok(partition);
    }

    let index = FeatureIndexer::new(normalizer).index_file(&train)?;
    index.save(dir.join(FEAT_INDEX))?;
    partition.features = index.len();

    let vectorizer = Vectorizer::new(&index, normalizer);
    partition.train = vectorizer.vectorize_file(&train, dir.join(TRAIN_YZX))?;

    let test = dir.join(TEST_LOG);
    if test.is_file() {
        partition.test = vectorizer.vectorize_file(&test, dir.join(TEST_YZX))?;
    }
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_aborts_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = PipelineConfig {
            train_impressions: vec![dir.path().join("nope.txt")],
            output_root: out.clone(),
            ..Default::default()
        };
        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(err, DataError::MissingInput { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = PipelineConfig {
            schema: Some(PathBuf::from("schema.txt")),
            train_impressions: vec![PathBuf::from("imp.20130606.txt")],
            train_clicks: vec![PathBuf::from("clk.20130606.txt")],
            test_logs: vec![],
            output_root: PathBuf::from("out"),
            advertiser_limit: Some(4),
        };
        let text = serde_json::to_string(&config).unwrap();
        let loaded: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(loaded, config);
    }
}
