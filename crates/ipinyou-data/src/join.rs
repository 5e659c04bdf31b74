//! Impression/click joining and labeling.
//!
//! The join is a single left pass over the impression stream against a
//! lookup built once from the much smaller click logs. Every impression
//! emits exactly one labeled row — clicks never filter impressions out,
//! and duplicate click records for the same key collapse to a single
//! positive label.
//!
//! The labeling pass also derives the `weekday`/`hour` columns from the
//! auction timestamp, normalizes empty fields to `null`, and rewrites the
//! raw user-agent column through a [`UserAgentNormalizer`], so the labeled
//! files come out ready for splitting and indexing.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use ipinyou_data::join::{ClickLookup, Labeler};
//! use ipinyou_data::schema::LogSchema;
//! use ipinyou_data::ua::KeywordNormalizer;
//!
//! let schema = LogSchema::from_names(["bidid", "timestamp", "creative", "payprice"]);
//! let mut clicks = ClickLookup::new();
//! clicks.insert("bid001-cr9");
//!
//! let labeler = Labeler::new(&schema, KeywordNormalizer::new());
//! let imps = Cursor::new("bid001\t20130606000104009\tcr9\t120\n");
//! let mut out = Vec::new();
//! labeler.label_impressions(&clicks, imps, &mut out).unwrap();
//!
//! let text = String::from_utf8(out).unwrap();
//! let row = text.lines().nth(1).unwrap();
//! assert!(row.starts_with("1\t"));
//! ```

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::loader::RowReader;
use crate::record::RawLogRow;
use crate::schema::LogSchema;
use crate::ua::UserAgentNormalizer;

/// The set of clicked join keys, built once per run from the click logs.
///
/// Keys are `bidid-creative` composites. Insertion is an idempotent
/// union: a key clicked twice stays one key, and click records whose key
/// matches no impression simply never match.
#[derive(Debug, Default, Clone)]
pub struct ClickLookup {
    keys: HashSet<String>,
}

impl ClickLookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the lookup from one or more click log files.
    ///
    /// # Errors
    ///
    /// Fails if a file is missing or the schema lacks the bid/creative
    /// columns; malformed click lines are skipped.
    pub fn from_files<P: AsRef<Path>>(paths: &[P], schema: &LogSchema) -> Result<Self> {
        let bid_idx = schema.bid_index()?;
        let creative_idx = schema.creative_index()?;
        let min_fields = bid_idx.max(creative_idx) + 1;

        let mut lookup = Self::new();
        for path in paths {
            let mut reader = RowReader::open(path, min_fields)?;
            while let Some(row) = reader.next_row()? {
                lookup.insert(join_key(&row, bid_idx, creative_idx));
            }
            debug!(
                path = %path.as_ref().display(),
                lines = reader.stats().lines,
                skipped = reader.stats().skipped,
                "loaded click log"
            );
        }
        info!(keys = lookup.len(), "click lookup built");
        Ok(lookup)
    }

    /// Inserts a join key.
    pub fn insert(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }

    /// Returns true if the key was clicked at least once.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of distinct clicked keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no clicks were recorded.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn join_key(row: &RawLogRow, bid_idx: usize, creative_idx: usize) -> String {
    format!(
        "{}-{}",
        row.get(bid_idx).unwrap_or(""),
        row.get(creative_idx).unwrap_or("")
    )
}

/// Counters for one labeling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelStats {
    /// Lines read from the input log.
    pub lines: u64,
    /// Labeled rows emitted.
    pub labeled: u64,
    /// Rows labeled positive.
    pub clicked: u64,
    /// Rows skipped (short row or unparseable timestamp).
    pub skipped: u64,
}

impl LabelStats {
    /// Folds another pass's counters into this one.
    pub fn merge(&mut self, other: &LabelStats) {
        self.lines += other.lines;
        self.labeled += other.labeled;
        self.clicked += other.clicked;
        self.skipped += other.skipped;
    }
}

/// Labels raw log streams into the `click weekday hour <raw columns>` layout.
pub struct Labeler<'a, N> {
    schema: &'a LogSchema,
    normalizer: N,
}

impl<'a, N: UserAgentNormalizer> Labeler<'a, N> {
    /// Creates a labeler over a raw log schema.
    pub fn new(schema: &'a LogSchema, normalizer: N) -> Self {
        Self { schema, normalizer }
    }

    /// Left-joins an impression stream against the click lookup.
    ///
    /// Writes the labeled header followed by one labeled row per usable
    /// impression. Rows too short to carry the timestamp and creative
    /// columns, or with an unparseable timestamp, are skipped and counted.
    pub fn label_impressions<R: BufRead, W: Write>(
        &self,
        clicks: &ClickLookup,
        input: R,
        mut out: W,
    ) -> Result<LabelStats> {
        let bid_idx = self.schema.bid_index()?;
        let ts_idx = self.schema.timestamp_index()?;
        let creative_idx = self.schema.creative_index()?;
        let min_fields = bid_idx.max(ts_idx).max(creative_idx) + 1;

        writeln!(out, "click\tweekday\thour\t{}", self.schema.header())?;

        let mut reader = RowReader::new(input, min_fields);
        let mut stats = LabelStats::default();
        while let Some(row) = reader.next_row()? {
            let Some((weekday, hour)) = derive_time(row.get(ts_idx).unwrap_or("")) else {
                stats.skipped += 1;
                continue;
            };
            let clicked = clicks.contains(&join_key(&row, bid_idx, creative_idx));
            self.write_row(&mut out, clicked, weekday, &hour, row)?;
            stats.labeled += 1;
            if clicked {
                stats.clicked += 1;
            }
        }

        stats.lines = reader.stats().lines;
        stats.skipped += reader.stats().skipped;
        Ok(stats)
    }

    /// Labels a test-round stream using its trailing feedback columns.
    ///
    /// Test logs carry `nclick`/`nconversation` instead of separate click
    /// records; the label is 0 iff `nclick` is `"0"`. The emitted header
    /// covers the feedback columns, which stay in the row.
    pub fn label_test<R: BufRead, W: Write>(&self, input: R, mut out: W) -> Result<LabelStats> {
        let test_schema = self.schema.with_feedback();
        let ts_idx = test_schema.timestamp_index()?;
        let nclick_idx = test_schema.require("nclick")?;
        let min_fields = ts_idx.max(nclick_idx) + 1;

        writeln!(out, "click\tweekday\thour\t{}", test_schema.header())?;

        let mut reader = RowReader::new(input, min_fields);
        let mut stats = LabelStats::default();
        while let Some(row) = reader.next_row()? {
            let Some((weekday, hour)) = derive_time(row.get(ts_idx).unwrap_or("")) else {
                stats.skipped += 1;
                continue;
            };
            let clicked = row.get(nclick_idx) != Some("0");
            self.write_row(&mut out, clicked, weekday, &hour, row)?;
            stats.labeled += 1;
            if clicked {
                stats.clicked += 1;
            }
        }

        stats.lines = reader.stats().lines;
        stats.skipped += reader.stats().skipped;
        Ok(stats)
    }

    /// Writes one labeled row: empty fields become `null` and the raw
    /// user-agent column is replaced with its normalized signature.
    fn write_row<W: Write>(
        &self,
        out: &mut W,
        clicked: bool,
        weekday: u32,
        hour: &str,
        row: RawLogRow,
    ) -> Result<()> {
        let ua_idx = self.schema.useragent_index().ok();

        write!(out, "{}\t{}\t{}", u8::from(clicked), weekday, hour)?;
        for (i, field) in row.into_fields().into_iter().enumerate() {
            let value = if Some(i) == ua_idx {
                self.normalizer.normalize(&field).signature()
            } else if field.is_empty() {
                "null".to_string()
            } else {
                field
            };
            out.write_all(b"\t")?;
            out.write_all(value.as_bytes())?;
        }
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// Derives `(weekday, hour)` from a `yyyyMMddHH...` timestamp.
///
/// Weekday uses Sunday=0 numbering. The hour is only taken when the
/// timestamp extends past ten characters; shorter stamps get `"00"`.
/// Returns `None` for stamps that do not parse to a calendar date.
pub fn derive_time(ts: &str) -> Option<(u32, String)> {
    if ts.len() < 8 {
        return None;
    }
    let year: i32 = ts.get(0..4)?.parse().ok()?;
    let month: u32 = ts.get(4..6)?.parse().ok()?;
    let day: u32 = ts.get(6..8)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let weekday = date.weekday().num_days_from_sunday();
    let hour = if ts.len() > 10 {
        ts.get(8..10)?.to_string()
    } else {
        "00".to_string()
    };
    Some((weekday, hour))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::ua::KeywordNormalizer;

    fn schema() -> LogSchema {
        LogSchema::from_names(["bidid", "timestamp", "useragent", "creative", "payprice"])
    }

    fn label(input: &str, clicks: &ClickLookup) -> (String, LabelStats) {
        let s = schema();
        let labeler = Labeler::new(&s, KeywordNormalizer::new());
        let mut out = Vec::new();
        let stats = labeler
            .label_impressions(clicks, Cursor::new(input), &mut out)
            .unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_derive_time() {
        // 2013-06-06 was a Thursday; Sunday=0 makes that 4.
        assert_eq!(derive_time("20130606000104009"), Some((4, "00".to_string())));
        assert_eq!(derive_time("2013060614"), Some((4, "00".to_string())));
        assert_eq!(derive_time("20130609"), Some((0, "00".to_string())));
        assert_eq!(derive_time("20130606235912345"), Some((4, "23".to_string())));
        assert_eq!(derive_time("2013"), None);
        assert_eq!(derive_time("20131406000000000"), None);
    }

    #[test]
    fn test_label_set_iff_key_clicked() {
        let mut clicks = ClickLookup::new();
        clicks.insert("bid1-cr1");

        let input = "bid1\t20130606000104009\tMozilla Windows Chrome\tcr1\t120\n\
                     bid2\t20130606000104009\tMozilla Windows Chrome\tcr1\t90\n";
        let (text, stats) = label(input, &clicks);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[0].starts_with("1\t"));
        assert!(rows[1].starts_with("0\t"));
        assert_eq!(stats.labeled, 2);
        assert_eq!(stats.clicked, 1);
    }

    #[test]
    fn test_duplicate_clicks_collapse() {
        let mut clicks = ClickLookup::new();
        clicks.insert("bid1-cr1");
        clicks.insert("bid1-cr1");
        assert_eq!(clicks.len(), 1);
        assert!(clicks.contains("bid1-cr1"));
    }

    #[test]
    fn test_same_bid_different_creative_does_not_match() {
        let mut clicks = ClickLookup::new();
        clicks.insert("bid1-cr1");

        let input = "bid1\t20130606000104009\tua\tcr2\t50\n";
        let (text, _) = label(input, &clicks);
        assert!(text.lines().nth(1).unwrap().starts_with("0\t"));
    }

    #[test]
    fn test_header_and_normalization() {
        let clicks = ClickLookup::new();
        let input = "bid1\t20130606000104009\tMozilla (Windows) Chrome/21\tcr1\t\n";
        let (text, _) = label(input, &clicks);

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "click\tweekday\thour\tbidid\ttimestamp\tuseragent\tcreative\tpayprice"
        );
        // Weekday 4, hour 00; UA collapsed; empty price becomes null.
        assert_eq!(
            lines.next().unwrap(),
            "0\t4\t00\tbid1\t20130606000104009\twindows_chrome\tcr1\tnull"
        );
    }

    #[test]
    fn test_bad_timestamp_skipped_not_fatal() {
        let clicks = ClickLookup::new();
        let input = "bid1\tnot-a-date-here\tua\tcr1\t10\n\
                     bid2\t20130606000104009\tua\tcr1\t10\n";
        let (text, stats) = label(input, &clicks);
        assert_eq!(text.lines().count(), 2); // header + one row
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.labeled, 1);
    }

    #[test]
    fn test_label_test_uses_nclick() {
        let s = schema();
        let labeler = Labeler::new(&s, KeywordNormalizer::new());
        let input = "bid1\t20130606000104009\tua\tcr1\t120\t0\t0\n\
                     bid2\t20130606000104009\tua\tcr1\t90\t2\t1\n";
        let mut out = Vec::new();
        let stats = labeler.label_test(Cursor::new(input), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert!(rows[0].ends_with("payprice\tnclick\tnconversation"));
        assert!(rows[1].starts_with("0\t"));
        assert!(rows[2].starts_with("1\t"));
        assert_eq!(stats.clicked, 1);
    }
}
