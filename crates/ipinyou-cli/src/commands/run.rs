//! Run Command Implementation
//!
//! Executes the full pipeline: label the training impressions against
//! the click logs, label the test rounds, split everything by
//! advertiser, then build each partition's feature index and vector
//! files. Configuration comes from a JSON file or from the flags below;
//! flags win over the file for the paths they set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ipinyou_data::pipeline::{run_pipeline, PipelineConfig};
use tracing::info;

/// Run the full pipeline: label, split, index, vectorize
///
/// # Example
///
/// ```bash
/// ipinyou run \
///     --imp imp.20130606.txt --clk clk.20130606.txt \
///     --test leaderboard.20130613.txt \
///     --output-root out --advertiser-limit 9
/// ```
#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Pipeline configuration file (JSON)
    #[arg(long, short = 'c', env = "IPINYOU_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Schema file; the built-in iPinYou layout is used when omitted
    #[arg(long, short = 's', env = "IPINYOU_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Raw impression log files for the training rounds
    #[arg(long = "imp")]
    pub impressions: Vec<PathBuf>,

    /// Raw click log files for the training rounds
    #[arg(long = "clk")]
    pub clicks: Vec<PathBuf>,

    /// Raw test-round log files (with feedback columns)
    #[arg(long = "test")]
    pub tests: Vec<PathBuf>,

    /// Root directory for all artifacts
    #[arg(long, short = 'o', env = "IPINYOU_OUTPUT_ROOT")]
    pub output_root: Option<PathBuf>,

    /// Cap on the number of advertiser partitions (first-seen order)
    #[arg(long)]
    pub advertiser_limit: Option<usize>,
}

impl RunCommand {
    /// Assembles the effective pipeline configuration.
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if self.schema.is_some() {
            config.schema = self.schema.clone();
        }
        if !self.impressions.is_empty() {
            config.train_impressions = self.impressions.clone();
        }
        if !self.clicks.is_empty() {
            config.train_clicks = self.clicks.clone();
        }
        if !self.tests.is_empty() {
            config.test_logs = self.tests.clone();
        }
        if let Some(output_root) = &self.output_root {
            config.output_root = output_root.clone();
        }
        if self.advertiser_limit.is_some() {
            config.advertiser_limit = self.advertiser_limit;
        }

        anyhow::ensure!(
            !config.train_impressions.is_empty(),
            "no training impression logs given (use --imp or a config file)"
        );
        anyhow::ensure!(
            !config.output_root.as_os_str().is_empty(),
            "no output root given (use --output-root or a config file)"
        );
        Ok(config)
    }

    /// Executes the run command.
    pub fn run(&self) -> Result<()> {
        let config = self.config()?;
        let report = run_pipeline(&config).context("pipeline failed")?;

        info!(
            advertisers = report.partitions.len(),
            labeled = report.labeled_rows(),
            skipped = report.skipped_rows(),
            report = %config.output_root.join("report.json").display(),
            "pipeline complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_command() -> RunCommand {
        RunCommand {
            config: None,
            schema: None,
            impressions: vec![],
            clicks: vec![],
            tests: vec![],
            output_root: None,
            advertiser_limit: None,
        }
    }

    #[test]
    fn test_flags_require_impressions_and_output() {
        let cmd = base_command();
        assert!(cmd.config().is_err());

        let mut cmd = base_command();
        cmd.impressions = vec![PathBuf::from("imp.txt")];
        assert!(cmd.config().is_err());

        cmd.output_root = Some(PathBuf::from("out"));
        let config = cmd.config().unwrap();
        assert_eq!(config.train_impressions, vec![PathBuf::from("imp.txt")]);
        assert_eq!(config.output_root, PathBuf::from("out"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "train_impressions": ["a.txt"],
                "train_clicks": ["c.txt"],
                "output_root": "from_file",
                "advertiser_limit": 3
            }"#,
        )
        .unwrap();

        let mut cmd = base_command();
        cmd.config = Some(path);
        cmd.output_root = Some(PathBuf::from("from_flag"));
        let config = cmd.config().unwrap();

        assert_eq!(config.output_root, PathBuf::from("from_flag"));
        assert_eq!(config.train_impressions, vec![PathBuf::from("a.txt")]);
        assert_eq!(config.advertiser_limit, Some(3));
    }
}
