//! Sparse vectorization.
//!
//! Rewrites labeled rows (train or test, any advertiser) into yzx lines:
//! `label price id:1 id:1 ...`. The feature index must be fully built
//! before any row of its partition is vectorized — that ordering is a
//! correctness dependency, not an optimization, since ids only exist once
//! indexing has assigned them.
//!
//! Values never seen in training resolve to their column's reserved
//! `other` bucket; a column with no index entry at all contributes
//! nothing. Ids are never invented and unknown values are never an error.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use ipinyou_data::index::FeatureIndexer;
//! use ipinyou_data::vectorize::Vectorizer;
//! use ipinyou_data::ua::KeywordNormalizer;
//!
//! let train = "click\tregion\tpayprice\n1\tCN\t120\n";
//! let index = FeatureIndexer::new(KeywordNormalizer::new())
//!     .index_reader(Cursor::new(train))
//!     .unwrap();
//!
//! let vectorizer = Vectorizer::new(&index, KeywordNormalizer::new());
//! let mut out = Vec::new();
//! vectorizer.vectorize_reader(Cursor::new(train), &mut out).unwrap();
//! // truncate=0, 1:other=1, 2:other=2, then 1:CN=3.
//! assert_eq!(String::from_utf8(out).unwrap(), "1 120 0:1 3:1\n");
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DataError, Result};
use crate::index::{FeatureIndex, FeaturePlan};
use crate::record::{LabeledRow, SparseVectorRow};
use crate::ua::UserAgentNormalizer;

/// Counters for one vectorization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStats {
    /// Data lines read (header excluded).
    pub lines: u64,
    /// Vector rows emitted.
    pub rows: u64,
    /// Rows skipped for not reaching the price column.
    pub skipped: u64,
}

impl VectorStats {
    /// Folds another pass's counters into this one.
    pub fn merge(&mut self, other: &VectorStats) {
        self.lines += other.lines;
        self.rows += other.rows;
        self.skipped += other.skipped;
    }
}

/// Rewrites labeled rows into sparse yzx records using a fixed index.
///
/// The index is read-only here; a `Vectorizer` can be shared across
/// partitions or threads freely.
pub struct Vectorizer<'a, N> {
    index: &'a FeatureIndex,
    normalizer: N,
}

impl<'a, N: UserAgentNormalizer> Vectorizer<'a, N> {
    /// Creates a vectorizer over a finished feature index.
    pub fn new(index: &'a FeatureIndex, normalizer: N) -> Self {
        Self { index, normalizer }
    }

    /// Vectorizes a single labeled row under the given plan.
    ///
    /// Emission order is the plan order: the `truncate` feature first,
    /// then plain categorical columns, transformed columns, and
    /// multi-value tags — stable and reproducible for byte-for-byte
    /// output comparisons.
    pub fn vectorize_row(&self, plan: &FeaturePlan, fields: &[String]) -> SparseVectorRow {
        let label = fields
            .get(plan.label_index())
            .cloned()
            .unwrap_or_else(|| "0".to_string());
        let price = plan
            .price_index()
            .and_then(|i| fields.get(i).cloned())
            .unwrap_or_else(|| "0".to_string());

        let mut feature_ids = Vec::new();
        if let Some(id) = self.index.truncate_id() {
            feature_ids.push(id);
        }
        for (col, key) in plan.row_features(fields, &self.normalizer) {
            if let Some(id) = self.index.resolve(col, &key) {
                feature_ids.push(id);
            }
        }
        SparseVectorRow {
            label,
            price,
            feature_ids,
        }
    }

    /// Vectorizes a labeled log stream (header line first) into yzx lines.
    ///
    /// Rows too short to reach the price column are skipped and counted.
    ///
    /// # Errors
    ///
    /// Fails if the stream is empty or its header lacks the price column.
    pub fn vectorize_reader<R: BufRead, W: Write>(
        &self,
        mut input: R,
        mut out: W,
    ) -> Result<VectorStats> {
        let mut header = String::new();
        if input.read_line(&mut header)? == 0 || header.trim().is_empty() {
            return Err(DataError::EmptyHeader {
                path: "<stream>".into(),
            });
        }
        let plan = FeaturePlan::from_header(header.trim_end_matches('\n'));
        let price_idx = plan.price_index().ok_or_else(|| DataError::MissingColumn {
            name: "payprice".to_string(),
        })?;

        let mut stats = VectorStats::default();
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            stats.lines += 1;

            let labeled = LabeledRow::from_line(line.strip_suffix('\n').unwrap_or(&line));
            if labeled.len() <= price_idx {
                stats.skipped += 1;
                continue;
            }
            let row = self.vectorize_row(&plan, labeled.fields());
            out.write_all(row.render().as_bytes())?;
            out.write_all(b"\n")?;
            stats.rows += 1;
        }
        Ok(stats)
    }

    /// Vectorizes a labeled log file into a yzx file.
    pub fn vectorize_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<VectorStats> {
        let input = input.as_ref();
        if !input.is_file() {
            return Err(DataError::MissingInput {
                path: input.to_path_buf(),
            });
        }
        let reader = BufReader::new(File::open(input)?);
        let mut writer = BufWriter::new(File::create(output.as_ref())?);
        let stats = self.vectorize_reader(reader, &mut writer)?;
        writer.flush()?;
        info!(
            input = %input.display(),
            output = %output.as_ref().display(),
            rows = stats.rows,
            skipped = stats.skipped,
            "vectorized"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::index::FeatureIndexer;
    use crate::ua::KeywordNormalizer;

    const HEADER: &str = "click\tregion\tslotid\tpayprice";

    fn build_index(rows: &[&str]) -> FeatureIndex {
        let mut text = String::from(HEADER);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        FeatureIndexer::new(KeywordNormalizer::new())
            .index_reader(Cursor::new(text))
            .unwrap()
    }

    fn vectorize(index: &FeatureIndex, rows: &[&str]) -> (String, VectorStats) {
        let mut text = String::from(HEADER);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        let vectorizer = Vectorizer::new(index, KeywordNormalizer::new());
        let mut out = Vec::new();
        let stats = vectorizer
            .vectorize_reader(Cursor::new(text), &mut out)
            .unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_train_rows_resolve_their_own_entries() {
        let rows = ["1\tCN\tA\t120", "0\tUS\tB\t80"];
        let index = build_index(&rows);
        let (text, stats) = vectorize(&index, &rows);

        // truncate=0, 1:other=1, 2:other=2, 3:other=3 (payprice is numeric,
        // so column 3 still gets a reserved bucket but never a value entry),
        // then 1:CN=4, 2:A=5, 1:US=6, 2:B=7.
        assert_eq!(text, "1 120 0:1 4:1 5:1\n0 80 0:1 6:1 7:1\n");
        assert_eq!(stats.rows, 2);
    }

    #[test]
    fn test_unseen_value_falls_back_to_other_bucket() {
        let index = build_index(&["1\tCN\tA\t120"]);
        let (text, _) = vectorize(&index, &["0\tFR\tA\t60"]);
        // FR was never indexed; region resolves to 1:other.
        assert_eq!(
            text,
            format!(
                "0 60 0:1 {}:1 {}:1\n",
                index.get("1:other").unwrap(),
                index.get("2:A").unwrap()
            )
        );
    }

    #[test]
    fn test_omission_when_no_entry_exists_at_all() {
        // A hand-built index without other-buckets: unseen values must be
        // silently omitted, never invented and never an error.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("featindex.txt");
        // Dense id space is required on load; pad with placeholder keys.
        std::fs::write(
            &path,
            "pad0\t0\npad1\t1\npad2\t2\npad3\t3\npad4\t4\n1:CN\t5\npad6\t6\npad7\t7\npad8\t8\n2:A\t9\n",
        )
        .unwrap();
        let index = FeatureIndex::load(&path).unwrap();

        let (text, _) = vectorize(&index, &["1\tCN\tA\t120", "0\tFR\tA\t60"]);
        assert_eq!(text, "1 120 5:1 9:1\n0 60 9:1\n");
    }

    #[test]
    fn test_short_rows_skipped() {
        let index = build_index(&["1\tCN\tA\t120"]);
        let (text, stats) = vectorize(&index, &["1\tCN", "1\tCN\tA\t120"]);
        assert_eq!(text.lines().count(), 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.rows, 1);
    }

    #[test]
    fn test_idempotent_reruns_byte_identical() {
        let rows = ["1\tCN\tA\t120", "0\tUS\tB\t80", "0\tCN\tB\t15"];
        let index = build_index(&rows);
        let (a, _) = vectorize(&index, &rows);
        let (b, _) = vectorize(&index, &rows);
        assert_eq!(a, b);
    }
}
