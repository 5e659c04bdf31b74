//! Advertiser partitioning.
//!
//! Streams a labeled log file into one subdirectory per advertiser id,
//! preserving row order and carrying the header line into every
//! partition file. The output file keeps the input file's name, so
//! splitting `train.log.txt` and then `test.log.txt` yields
//! `<out>/<advertiser>/train.log.txt` and `<out>/<advertiser>/test.log.txt`.
//!
//! A splitter remembers the advertisers it has seen across files in
//! first-seen order. An optional limit caps how many partitions are ever
//! created; rows for advertisers past the limit, like rows with a missing
//! advertiser field, are dropped and counted.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DataError, Result};
use crate::schema::LogSchema;

/// Counters for one split pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    /// Data rows read (header excluded).
    pub rows: u64,
    /// Rows written to a partition.
    pub written: u64,
    /// Rows dropped: advertiser field missing, empty, or past the
    /// partition limit.
    pub dropped: u64,
}

impl SplitStats {
    /// Folds another pass's counters into this one.
    pub fn merge(&mut self, other: &SplitStats) {
        self.rows += other.rows;
        self.written += other.written;
        self.dropped += other.dropped;
    }
}

/// Splits labeled log files into per-advertiser partition directories.
pub struct AdvertiserSplitter {
    out_root: PathBuf,
    limit: Option<usize>,
    seen: Vec<String>,
}

impl AdvertiserSplitter {
    /// Creates a splitter writing partitions under `out_root`.
    ///
    /// `limit` caps the number of advertiser partitions materialized;
    /// `None` means unlimited.
    pub fn new(out_root: impl Into<PathBuf>, limit: Option<usize>) -> Self {
        Self {
            out_root: out_root.into(),
            limit,
            seen: Vec::new(),
        }
    }

    /// Advertiser ids admitted so far, in first-seen order.
    pub fn advertisers(&self) -> &[String] {
        &self.seen
    }

    /// Splits one labeled file into `<out_root>/<advertiser>/<file name>`.
    ///
    /// The advertiser column is located by name in the file's own header.
    /// Row order within each partition matches input order; the header is
    /// written once per partition file.
    pub fn split_file(&mut self, input: impl AsRef<Path>) -> Result<SplitStats> {
        let input = input.as_ref();
        if !input.is_file() {
            return Err(DataError::MissingInput {
                path: input.to_path_buf(),
            });
        }
        let file_name = input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("part.log.txt"));

        let mut reader = BufReader::new(File::open(input)?);
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
            return Err(DataError::EmptyHeader {
                path: input.to_path_buf(),
            });
        }
        let schema = LogSchema::from_names(
            header
                .trim_end_matches('\n')
                .split('\t')
                .map(str::trim),
        );
        let adv_idx = schema.advertiser_index()?;

        let mut writers: HashMap<String, BufWriter<File>> = HashMap::new();
        let mut stats = SplitStats::default();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            stats.rows += 1;

            let advertiser = line
                .strip_suffix('\n')
                .unwrap_or(&line)
                .split('\t')
                .nth(adv_idx)
                .unwrap_or("")
                .to_string();
            if advertiser.is_empty() {
                stats.dropped += 1;
                continue;
            }

            if !writers.contains_key(&advertiser) {
                if !self.admit(&advertiser) {
                    stats.dropped += 1;
                    continue;
                }
                let dir = self.out_root.join(&advertiser);
                fs::create_dir_all(&dir)?;
                let mut writer = BufWriter::new(File::create(dir.join(&file_name))?);
                writer.write_all(header.as_bytes())?;
                debug!(advertiser = %advertiser, file = %file_name.display(), "opened partition");
                writers.insert(advertiser.clone(), writer);
            }
            // Admitted advertiser whose partition file was already opened
            // in this pass, or just opened above.
            if let Some(writer) = writers.get_mut(&advertiser) {
                writer.write_all(line.as_bytes())?;
                if !line.ends_with('\n') {
                    writer.write_all(b"\n")?;
                }
                stats.written += 1;
            }
        }

        for writer in writers.values_mut() {
            writer.flush()?;
        }
        info!(
            input = %input.display(),
            partitions = writers.len(),
            written = stats.written,
            dropped = stats.dropped,
            "split by advertiser"
        );
        Ok(stats)
    }

    /// Admits an advertiser, honoring the partition limit.
    fn admit(&mut self, advertiser: &str) -> bool {
        if self.seen.iter().any(|a| a == advertiser) {
            return true;
        }
        if let Some(limit) = self.limit {
            if self.seen.len() >= limit {
                return false;
            }
        }
        self.seen.push(advertiser.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const HEADER: &str = "click\tweekday\tadvertiser\tpayprice\n";

    fn write_log(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut text = String::from(HEADER);
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_partitions_preserve_order_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_log(
            dir.path(),
            "train.log.txt",
            &[
                "1\t4\t1458\t120",
                "0\t4\t3358\t80",
                "0\t5\t1458\t60",
            ],
        );

        let mut splitter = AdvertiserSplitter::new(dir.path().join("out"), None);
        let stats = splitter.split_file(&input).unwrap();
        assert_eq!(stats.written, 3);
        assert_eq!(stats.dropped, 0);
        assert_eq!(splitter.advertisers(), ["1458", "3358"]);

        let part = fs::read_to_string(dir.path().join("out/1458/train.log.txt")).unwrap();
        assert_eq!(part, format!("{}1\t4\t1458\t120\n0\t5\t1458\t60\n", HEADER));
    }

    #[test]
    fn test_missing_advertiser_dropped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_log(
            dir.path(),
            "train.log.txt",
            &["1\t4\t\t120", "0\t4", "0\t5\t1458\t60"],
        );

        let mut splitter = AdvertiserSplitter::new(dir.path().join("out"), None);
        let stats = splitter.split_file(&input).unwrap();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_limit_caps_partitions_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_log(
            dir.path(),
            "train.log.txt",
            &["1\t4\t1458\t120", "0\t4\t3358\t80", "0\t4\t3386\t70"],
        );
        let test = write_log(
            dir.path(),
            "test.log.txt",
            &["0\t5\t3358\t50", "0\t5\t2259\t40"],
        );

        let out = dir.path().join("out");
        let mut splitter = AdvertiserSplitter::new(&out, Some(2));
        splitter.split_file(&train).unwrap();
        let stats = splitter.split_file(&test).unwrap();

        // 3386 was past the limit in train; 2259 is past it in test.
        assert_eq!(splitter.advertisers(), ["1458", "3358"]);
        assert!(out.join("3358/test.log.txt").is_file());
        assert!(!out.join("3386").exists());
        assert!(!out.join("2259").exists());
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_header_without_advertiser_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.log.txt");
        fs::write(&path, "click\tweekday\n1\t4\n").unwrap();
        let mut splitter = AdvertiserSplitter::new(dir.path().join("out"), None);
        let err = splitter.split_file(&path).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }
}
