//! Schema-driven log loading.
//!
//! [`RowReader`] turns a buffered text stream into [`RawLogRow`]s. Rows
//! that do not carry enough fields for the operation at hand are skipped
//! and counted, never fatal: a multi-million-line auction log routinely
//! contains a handful of truncated lines and the batch must survive them.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use ipinyou_data::loader::RowReader;
//!
//! let input = Cursor::new("a\tb\tc\nshort\nd\te\tf\n");
//! let mut reader = RowReader::new(input, 3);
//!
//! let mut rows = 0;
//! while let Some(row) = reader.next_row().unwrap() {
//!     assert_eq!(row.len(), 3);
//!     rows += 1;
//! }
//! assert_eq!(rows, 2);
//! assert_eq!(reader.stats().skipped, 1);
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{DataError, Result};
use crate::record::RawLogRow;

/// Line-level counters for one parsing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Total lines read from the input.
    pub lines: u64,
    /// Lines skipped for having too few fields.
    pub skipped: u64,
}

impl ParseStats {
    /// Folds another pass's counters into this one.
    pub fn merge(&mut self, other: &ParseStats) {
        self.lines += other.lines;
        self.skipped += other.skipped;
    }
}

/// Opens a list of log files as one concatenated buffered stream.
///
/// Datasets arrive as one file per day/round; downstream passes treat
/// them as a single log. Each file ends with a newline, so concatenation
/// preserves line boundaries exactly as piping them through `cat` would.
///
/// # Errors
///
/// Returns [`DataError::MissingInput`] for the first path that is not an
/// existing file.
pub fn open_concat(paths: &[PathBuf]) -> Result<BufReader<Box<dyn Read + Send>>> {
    let mut reader: Box<dyn Read + Send> = Box::new(std::io::empty());
    for path in paths {
        if !path.is_file() {
            return Err(DataError::MissingInput { path: path.clone() });
        }
        reader = Box::new(reader.chain(File::open(path)?));
    }
    Ok(BufReader::new(reader))
}

/// Streams [`RawLogRow`]s out of a tab-delimited text source.
///
/// `min_fields` is the smallest field count a row must have to be usable
/// by the caller (typically one past the highest column index it reads);
/// shorter rows are dropped and recorded in [`ParseStats`].
#[derive(Debug)]
pub struct RowReader<R> {
    reader: R,
    min_fields: usize,
    stats: ParseStats,
    buf: String,
}

impl RowReader<BufReader<File>> {
    /// Opens a log file for row streaming.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingInput`] if the path is not an existing
    /// file, so a bad invocation fails before any output is produced.
    pub fn open(path: impl AsRef<Path>, min_fields: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::new(BufReader::new(File::open(path)?), min_fields))
    }
}

impl<R: BufRead> RowReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R, min_fields: usize) -> Self {
        Self {
            reader,
            min_fields,
            stats: ParseStats::default(),
            buf: String::new(),
        }
    }

    /// Reads the next usable row, or `None` at end of input.
    ///
    /// Rows with fewer than `min_fields` fields are skipped and counted;
    /// only I/O failures surface as errors.
    pub fn next_row(&mut self) -> Result<Option<RawLogRow>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.stats.lines += 1;

            let line = self.buf.strip_suffix('\n').unwrap_or(&self.buf);
            let row = RawLogRow::from_line(line);
            if row.len() < self.min_fields {
                self.stats.skipped += 1;
                trace!(
                    line = self.stats.lines,
                    fields = row.len(),
                    needed = self.min_fields,
                    "skipping short row"
                );
                continue;
            }
            return Ok(Some(row));
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn collect<R: BufRead>(mut reader: RowReader<R>) -> (Vec<RawLogRow>, ParseStats) {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row().unwrap() {
            rows.push(row);
        }
        (rows, *reader.stats())
    }

    #[test]
    fn test_reads_all_well_formed_rows() {
        let input = Cursor::new("a\tb\nc\td\ne\tf\n");
        let (rows, stats) = collect(RowReader::new(input, 2));
        assert_eq!(rows.len(), 3);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_skips_and_counts_short_rows() {
        let input = Cursor::new("a\tb\tc\nbad\na\tb\tc\ntoo\tshort\n");
        let (rows, stats) = collect(RowReader::new(input, 3));
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn test_last_line_without_newline() {
        let input = Cursor::new("a\tb\nc\td");
        let (rows, _) = collect(RowReader::new(input, 2));
        assert_eq!(rows[1].get(1), Some("d"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = RowReader::open("/nonexistent/imp.txt", 1).unwrap_err();
        assert!(matches!(err, DataError::MissingInput { .. }));
    }

    #[test]
    fn test_stats_merge() {
        let mut a = ParseStats {
            lines: 10,
            skipped: 1,
        };
        a.merge(&ParseStats {
            lines: 5,
            skipped: 2,
        });
        assert_eq!(a.lines, 15);
        assert_eq!(a.skipped, 3);
    }
}
