//! Row value types.
//!
//! Three record shapes flow through the pipeline:
//!
//! - [`RawLogRow`] — one parsed line of a raw impression or click log.
//! - [`LabeledRow`] — a raw row prefixed with `click`, `weekday`, `hour`.
//! - [`SparseVectorRow`] — the sparse numeric encoding of a labeled row.
//!
//! Label and price are kept as the original strings rather than parsed
//! numbers: output files must reproduce the input bytes verbatim, and
//! round-tripping through a numeric type could change them (leading
//! zeros, for instance).

use serde::{Deserialize, Serialize};

/// One parsed line of a raw delimited log.
///
/// Immutable once parsed; the loader discards rows after they are joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogRow {
    fields: Vec<String>,
}

impl RawLogRow {
    /// Parses a tab-delimited line (without its trailing newline).
    pub fn from_line(line: &str) -> Self {
        Self {
            fields: line.split('\t').map(str::to_string).collect(),
        }
    }

    /// Number of fields in this row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// All fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Consumes the row, yielding its fields.
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

/// A raw row extended with the click label and derived time columns.
///
/// Field 0 is always the click label; the clearing price stays at the
/// position the labeled schema declares for it. Rendering is a plain tab
/// join, so what was parsed is what gets written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRow {
    fields: Vec<String>,
}

impl LabeledRow {
    /// Builds a labeled row from already-ordered fields
    /// (`click`, `weekday`, `hour`, then the raw columns).
    pub fn from_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Parses a tab-delimited labeled line.
    pub fn from_line(line: &str) -> Self {
        Self {
            fields: line.split('\t').map(str::to_string).collect(),
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// The click label field (column 1 of the positional contract).
    pub fn label(&self) -> &str {
        self.get(0).unwrap_or("0")
    }

    /// All fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The tab-joined line for this row, without a trailing newline.
    pub fn render(&self) -> String {
        self.fields.join("\t")
    }
}

/// The sparse numeric encoding of one labeled row.
///
/// Every present feature is implicitly weighted 1, so only ids are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseVectorRow {
    /// The click label, carried through as text.
    pub label: String,
    /// The clearing price, carried through as text.
    pub price: String,
    /// Feature ids present in this row, in emission order.
    pub feature_ids: Vec<u32>,
}

impl SparseVectorRow {
    /// Renders the row in yzx format: `label price id:1 id:1 ...`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(16 + self.feature_ids.len() * 8);
        out.push_str(&self.label);
        out.push(' ');
        out.push_str(&self.price);
        for id in &self.feature_ids {
            out.push(' ');
            out.push_str(&id.to_string());
            out.push_str(":1");
        }
        out
    }
}
