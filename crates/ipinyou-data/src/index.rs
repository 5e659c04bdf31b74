//! Feature indexing.
//!
//! The feature index maps every distinct `(column, value)` pair observed
//! in the training partition to a dense integer id. Assignment is
//! first-occurrence ordered: ids are a deterministic function of input
//! order, so rerunning over byte-identical input reproduces a
//! byte-identical `featindex.txt`. This determinism is a correctness
//! requirement — downstream vector files must stay stable across
//! reproductions.
//!
//! Two kinds of entries are reserved before any row is scanned:
//!
//! - `truncate` → 0, a bias-like feature present in every vector;
//! - `<col>:other` for every non-label column, the fallback bucket a
//!   vectorizer uses for values never seen in training.
//!
//! Id assignment is owned by an explicit [`IndexBuilder`] context rather
//! than any ambient counter, and a finished [`FeatureIndex`] is never
//! mutated again.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use ipinyou_data::index::FeatureIndexer;
//! use ipinyou_data::ua::KeywordNormalizer;
//!
//! let log = "click\tregion\n1\tCN\n0\tUS\n";
//! let indexer = FeatureIndexer::new(KeywordNormalizer::new());
//! let index = indexer.index_reader(Cursor::new(log)).unwrap();
//!
//! assert_eq!(index.get("truncate"), Some(0)); // reserved
//! assert_eq!(index.get("1:other"), Some(1));  // reserved fallback bucket
//! assert_eq!(index.get("1:CN"), Some(2));     // first occurrence
//! assert_eq!(index.get("1:US"), Some(3));
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{DataError, Result};
use crate::record::LabeledRow;
use crate::schema::{ColumnKind, LogSchema};
use crate::ua::UserAgentNormalizer;

/// The reserved always-present feature key.
pub const TRUNCATE_KEY: &str = "truncate";

/// The fallback value bucket reserved per column.
pub const OTHER_VALUE: &str = "other";

/// Buckets an ad-slot floor price into the benchmark's fixed ranges.
///
/// Unparseable prices land in the `0` bucket.
pub fn bucket_price(raw: &str) -> &'static str {
    match raw.trim().parse::<i64>() {
        Ok(p) if p > 100 => "101+",
        Ok(p) if p > 50 => "51-100",
        Ok(p) if p > 10 => "11-50",
        Ok(p) if p > 0 => "1-10",
        _ => "0",
    }
}

/// Splits a multi-value tag field into its tags.
///
/// Empty content yields the single tag `null`, so absent tag lists still
/// occupy one feature.
pub fn split_tags(content: &str) -> Vec<&str> {
    if content.is_empty() || content == "\n" {
        return vec!["null"];
    }
    content.trim().split(',').collect()
}

/// The per-column extraction plan derived from a labeled file's header.
///
/// Columns are grouped by [`ColumnKind`] and kept in header order inside
/// each group; features are emitted plain-categorical first, then
/// transformed (user-agent, price bucket), then multi-value. The grouping
/// makes the emission order stable and reproducible for any header.
#[derive(Debug, Clone)]
pub struct FeaturePlan {
    plain: Vec<usize>,
    transformed: Vec<(usize, ColumnKind)>,
    multi: Vec<usize>,
    label_idx: usize,
    price_idx: Option<usize>,
    columns: usize,
}

impl FeaturePlan {
    /// Builds a plan from a labeled header line (tab-separated names).
    pub fn from_header(header: &str) -> Self {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        Self::from_schema(&LogSchema::from_names(names))
    }

    /// Builds a plan from a labeled schema.
    ///
    /// Indexing needs neither the label nor the price column, so both are
    /// recorded only if declared; vectorization insists on the price.
    pub fn from_schema(schema: &LogSchema) -> Self {
        let mut plain = Vec::new();
        let mut transformed = Vec::new();
        let mut multi = Vec::new();
        for (i, column) in schema.columns().iter().enumerate() {
            match column.kind() {
                ColumnKind::Categorical => plain.push(i),
                ColumnKind::UserAgent | ColumnKind::PriceBucket => {
                    transformed.push((i, column.kind()))
                }
                ColumnKind::MultiValue => multi.push(i),
                _ => {}
            }
        }
        Self {
            plain,
            transformed,
            multi,
            label_idx: schema.label_index().unwrap_or(0),
            price_idx: schema.price_index().ok(),
            columns: schema.len(),
        }
    }

    /// Position of the label column (defaults to column 0).
    pub fn label_index(&self) -> usize {
        self.label_idx
    }

    /// Position of the clearing price column, if declared.
    pub fn price_index(&self) -> Option<usize> {
        self.price_idx
    }

    /// Number of columns the header declared.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Emits the `(column, key)` features of one row, in plan order.
    ///
    /// Columns beyond the row's length contribute nothing; the caller
    /// decides whether such rows are acceptable at all.
    pub fn row_features<N: UserAgentNormalizer>(
        &self,
        fields: &[String],
        normalizer: &N,
    ) -> Vec<(usize, String)> {
        let mut features =
            Vec::with_capacity(self.plain.len() + self.transformed.len() + self.multi.len());

        for &col in &self.plain {
            if let Some(value) = fields.get(col) {
                features.push((col, format!("{}:{}", col, value)));
            }
        }
        for &(col, kind) in &self.transformed {
            if let Some(value) = fields.get(col) {
                let value = match kind {
                    ColumnKind::UserAgent => normalizer.normalize(value).signature(),
                    _ => bucket_price(value).to_string(),
                };
                features.push((col, format!("{}:{}", col, value)));
            }
        }
        for &col in &self.multi {
            if let Some(value) = fields.get(col) {
                for tag in split_tags(value) {
                    features.push((col, format!("{}:{}", col, tag)));
                }
            }
        }
        features
    }
}

/// A finished, immutable `(column, value)` → id mapping.
///
/// Ids are dense: the id space is exactly `0..len()`, with each id owned
/// by exactly one key.
#[derive(Debug, Clone, Default)]
pub struct FeatureIndex {
    map: HashMap<String, u32>,
    keys: Vec<String>,
}

impl FeatureIndex {
    /// The id of a key, if indexed.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.map.get(key).copied()
    }

    /// Resolves a `(column, value)` pair, falling back to the column's
    /// reserved `other` bucket for unseen values.
    ///
    /// Returns `None` only when neither the value nor the column's
    /// `other` entry is indexed; such features are silently omitted from
    /// vectors, never invented.
    pub fn resolve(&self, column: usize, key: &str) -> Option<u32> {
        self.get(key)
            .or_else(|| self.get(&format!("{}:{}", column, OTHER_VALUE)))
    }

    /// The id of the always-present `truncate` feature.
    pub fn truncate_id(&self) -> Option<u32> {
        self.get(TRUNCATE_KEY)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(id, key)| (key.as_str(), id as u32))
    }

    /// Writes the index as `key<TAB>id` lines in id order.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        for (key, id) in self.entries() {
            writeln!(out, "{}\t{}", key, id)?;
        }
        Ok(())
    }

    /// Saves the index to `featindex.txt` at the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Loads a previously saved index.
    ///
    /// The file must hold a dense id space with unique keys; anything
    /// else is reported as [`DataError::CorruptIndex`].
    ///
    /// # Hazard
    ///
    /// An index produced by a *different* training snapshot maps values
    /// to stale ids silently. Nothing at runtime can detect the mismatch;
    /// callers must pair each index with the training run that built it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Self::read_from(File::open(path)?, path)
    }

    fn read_from<R: Read>(reader: R, path: &Path) -> Result<Self> {
        let corrupt = |message: String| DataError::CorruptIndex {
            path: path.to_path_buf(),
            message,
        };

        let mut pairs: Vec<(String, u32)> = Vec::new();
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (key, id) = line
                .rsplit_once('\t')
                .ok_or_else(|| corrupt(format!("line {} has no tab separator", lineno + 1)))?;
            let id: u32 = id
                .parse()
                .map_err(|_| corrupt(format!("line {} has a non-numeric id", lineno + 1)))?;
            pairs.push((key.to_string(), id));
        }

        let mut keys = vec![String::new(); pairs.len()];
        let mut map = HashMap::with_capacity(pairs.len());
        for (key, id) in pairs {
            let slot = keys
                .get_mut(id as usize)
                .ok_or_else(|| corrupt(format!("id {} outside dense range", id)))?;
            if !slot.is_empty() {
                return Err(corrupt(format!("id {} assigned twice", id)));
            }
            if map.insert(key.clone(), id).is_some() {
                return Err(corrupt(format!("key {:?} appears twice", key)));
            }
            *slot = key;
        }
        Ok(Self { map, keys })
    }
}

/// The indexing context: owns the next-id counter and the mapping table.
///
/// Threaded explicitly through the indexing pass; there is no global
/// state, so independent builders never interfere.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: FeatureIndex,
}

impl IndexBuilder {
    /// Creates a builder with the `truncate` entry pre-assigned id 0.
    pub fn new() -> Self {
        let mut builder = Self {
            index: FeatureIndex::default(),
        };
        builder.observe(TRUNCATE_KEY);
        builder
    }

    /// Reserves the `<col>:other` fallback entry for every non-label
    /// column of a `columns`-wide header, in column order.
    pub fn reserve_other_buckets(&mut self, columns: usize) {
        for col in 1..columns {
            self.observe(&format!("{}:{}", col, OTHER_VALUE));
        }
    }

    /// Records a key, assigning the next id on first occurrence.
    ///
    /// Returns the key's id, stable for the lifetime of the builder.
    pub fn observe(&mut self, key: &str) -> u32 {
        if let Some(id) = self.index.map.get(key) {
            return *id;
        }
        let id = self.index.keys.len() as u32;
        self.index.map.insert(key.to_string(), id);
        self.index.keys.push(key.to_string());
        id
    }

    /// Number of entries assigned so far.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Finalizes the index; no further ids will ever be assigned to it.
    pub fn finish(self) -> FeatureIndex {
        self.index
    }
}

/// Scans training-origin labeled logs and builds their feature index.
pub struct FeatureIndexer<N> {
    normalizer: N,
}

impl<N: UserAgentNormalizer> FeatureIndexer<N> {
    /// Creates an indexer with the given user-agent normalizer.
    pub fn new(normalizer: N) -> Self {
        Self { normalizer }
    }

    /// Indexes a labeled training log file.
    pub fn index_file(&self, path: impl AsRef<Path>) -> Result<FeatureIndex> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let index = self.index_reader(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), features = index.len(), "feature index built");
        Ok(index)
    }

    /// Indexes a labeled training log stream (header line first).
    ///
    /// Rows are scanned in input order; every indexed column's values are
    /// assigned first-occurrence ids after the reserved entries.
    ///
    /// # Errors
    ///
    /// Fails on an empty input (no header to derive the plan from).
    pub fn index_reader<R: BufRead>(&self, mut input: R) -> Result<FeatureIndex> {
        let mut header = String::new();
        if input.read_line(&mut header)? == 0 || header.trim().is_empty() {
            return Err(DataError::EmptyHeader {
                path: "<stream>".into(),
            });
        }
        let plan = FeaturePlan::from_header(header.trim_end_matches('\n'));

        let mut builder = IndexBuilder::new();
        builder.reserve_other_buckets(plan.columns());

        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let row = LabeledRow::from_line(line.strip_suffix('\n').unwrap_or(&line));
            for (_, key) in plan.row_features(row.fields(), &self.normalizer) {
                builder.observe(&key);
            }
        }
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::ua::KeywordNormalizer;

    const HEADER: &str = "click\tweekday\tregion\tuseragent\tslotprice\tpayprice\tusertag";

    fn index(rows: &[&str]) -> FeatureIndex {
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

    #[test]
    fn test_reserved_entries_come_first() {
        let idx = index(&[]);
        // truncate + one other-bucket per non-label column.
        assert_eq!(idx.truncate_id(), Some(0));
        assert_eq!(idx.get("1:other"), Some(1));
        assert_eq!(idx.get("6:other"), Some(6));
        assert_eq!(idx.len(), 7);
    }

    #[test]
    fn test_first_occurrence_ordering() {
        let idx = index(&[
            "1\t4\tCN\twindows_chrome\t5\t120\ta,b",
            "0\t4\tUS\twindows_chrome\t200\t80\tb",
        ]);
        // Row 1: weekday, region, then transformed, then tags.
        assert_eq!(idx.get("1:4"), Some(7));
        assert_eq!(idx.get("2:CN"), Some(8));
        assert_eq!(idx.get("3:windows_chrome"), Some(9));
        assert_eq!(idx.get("4:1-10"), Some(10));
        assert_eq!(idx.get("6:a"), Some(11));
        assert_eq!(idx.get("6:b"), Some(12));
        // Row 2 only adds what row 1 did not.
        assert_eq!(idx.get("2:US"), Some(13));
        assert_eq!(idx.get("4:101+"), Some(14));
        assert_eq!(idx.len(), 15);
    }

    #[test]
    fn test_determinism_and_uniqueness() {
        let rows = [
            "1\t4\tCN\tua\t5\t120\ta,b",
            "0\t2\tUS\tua\t0\t80\tnull",
            "0\t4\tCN\tua\t60\t10\tc",
        ];
        let a = index(&rows);
        let b = index(&rows);

        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        a.write_to(&mut out_a).unwrap();
        b.write_to(&mut out_b).unwrap();
        assert_eq!(out_a, out_b);

        // No id is shared and no key maps twice.
        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_keys = std::collections::HashSet::new();
        for (key, id) in a.entries() {
            assert!(seen_ids.insert(id));
            assert!(seen_keys.insert(key.to_string()));
        }
    }

    #[test]
    fn test_price_buckets() {
        assert_eq!(bucket_price("0"), "0");
        assert_eq!(bucket_price("1"), "1-10");
        assert_eq!(bucket_price("10"), "1-10");
        assert_eq!(bucket_price("11"), "11-50");
        assert_eq!(bucket_price("50"), "11-50");
        assert_eq!(bucket_price("51"), "51-100");
        assert_eq!(bucket_price("100"), "51-100");
        assert_eq!(bucket_price("101"), "101+");
        assert_eq!(bucket_price("-3"), "0");
        assert_eq!(bucket_price("abc"), "0");
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags(""), vec!["null"]);
        assert_eq!(split_tags("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_tags("null"), vec!["null"]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let idx = index(&["1\t4\tCN\tua\t5\t120\ta,b"]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("featindex.txt");
        idx.save(&path).unwrap();

        let loaded = FeatureIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), idx.len());
        for (key, id) in idx.entries() {
            assert_eq!(loaded.get(key), Some(id));
        }
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("featindex.txt");
        std::fs::write(&path, "truncate\t0\n1:other\t0\n").unwrap();
        let err = FeatureIndex::load(&path).unwrap_err();
        assert!(matches!(err, DataError::CorruptIndex { .. }));
    }

    #[test]
    fn test_resolve_falls_back_to_other() {
        let idx = index(&["1\t4\tCN\tua\t5\t120\ta"]);
        assert_eq!(idx.resolve(2, "2:CN"), idx.get("2:CN"));
        assert_eq!(idx.resolve(2, "2:FR"), idx.get("2:other"));
    }
}
