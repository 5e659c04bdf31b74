//! Log schema definitions.
//!
//! A [`LogSchema`] declares the ordered column layout of a delimited log
//! file together with a semantic [`ColumnKind`] per column. Column typing
//! decisions (which columns are categorical, numeric, identifiers, and so
//! on) live here rather than in the parsing or indexing code, so the same
//! engine serves impression logs, click logs, and labeled intermediate
//! files alike.
//!
//! The well-known positions of the labeled format — label in column 1,
//! clearing price in a fixed later column — are exposed as named accessors
//! instead of bare indices, while the on-disk byte layout they describe
//! stays exactly what downstream consumers expect.
//!
//! # Example
//!
//! ```
//! use ipinyou_data::schema::LogSchema;
//!
//! let raw = LogSchema::ipinyou();
//! let labeled = raw.labeled();
//!
//! assert_eq!(labeled.label_index().unwrap(), 0);
//! assert_eq!(labeled.price_index().unwrap(), 23);
//! assert_eq!(labeled.advertiser_index().unwrap(), 25);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// The 24-column iPinYou base log layout, shared by impression and click logs.
pub const IPINYOU_COLUMNS: [&str; 24] = [
    "bidid",
    "timestamp",
    "logtype",
    "ipinyouid",
    "useragent",
    "IP",
    "region",
    "city",
    "adexchange",
    "domain",
    "url",
    "urlid",
    "slotid",
    "slotwidth",
    "slotheight",
    "slotvisibility",
    "slotformat",
    "slotprice",
    "creative",
    "bidprice",
    "payprice",
    "keypage",
    "advertiser",
    "usertag",
];

/// Extra feedback columns carried by test-round logs.
pub const FEEDBACK_COLUMNS: [&str; 2] = ["nclick", "nconversation"];

/// Semantic kind of a log column.
///
/// The kind decides how a column participates in feature indexing and
/// vectorization:
///
/// - [`Categorical`](ColumnKind::Categorical) columns are indexed verbatim.
/// - [`UserAgent`](ColumnKind::UserAgent) and
///   [`PriceBucket`](ColumnKind::PriceBucket) columns are indexed after a
///   value transform (keyword signature, price bucketing).
/// - [`MultiValue`](ColumnKind::MultiValue) columns hold comma-separated
///   tag lists; each tag is indexed separately.
/// - All other kinds are excluded from indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// The binary click label.
    Label,
    /// A categorical column, indexed as-is.
    Categorical,
    /// A raw user-agent string, indexed as an `os_browser` signature.
    UserAgent,
    /// An integer price floor, indexed as a range bucket.
    PriceBucket,
    /// A comma-separated tag list; each tag is indexed separately.
    MultiValue,
    /// A `yyyyMMddHHmmss...` timestamp, source of derived weekday/hour.
    Timestamp,
    /// A numeric column (prices), carried through but never indexed.
    Numeric,
    /// An opaque identifier (bid id, cookie, URL), never indexed.
    Identifier,
}

impl ColumnKind {
    /// Returns true if values of this kind contribute to the feature index.
    pub fn is_indexed(self) -> bool {
        matches!(
            self,
            ColumnKind::Categorical
                | ColumnKind::UserAgent
                | ColumnKind::PriceBucket
                | ColumnKind::MultiValue
        )
    }
}

static COLUMN_KINDS: Lazy<HashMap<&'static str, ColumnKind>> = Lazy::new(|| {
    use ColumnKind::*;
    HashMap::from([
        ("click", Label),
        ("weekday", Categorical),
        ("hour", Categorical),
        ("bidid", Identifier),
        ("timestamp", Timestamp),
        ("logtype", Identifier),
        ("ipinyouid", Identifier),
        ("useragent", UserAgent),
        ("IP", Categorical),
        ("region", Categorical),
        ("city", Categorical),
        ("adexchange", Categorical),
        ("domain", Categorical),
        ("url", Identifier),
        ("urlid", Identifier),
        ("slotid", Categorical),
        ("slotwidth", Categorical),
        ("slotheight", Categorical),
        ("slotvisibility", Categorical),
        ("slotformat", Categorical),
        ("slotprice", PriceBucket),
        ("creative", Categorical),
        ("bidprice", Numeric),
        ("payprice", Numeric),
        ("keypage", Identifier),
        ("advertiser", Categorical),
        ("usertag", MultiValue),
        ("nclick", Numeric),
        ("nconversation", Numeric),
    ])
});

/// Looks up the semantic kind for a known column name.
///
/// Unknown names default to [`ColumnKind::Categorical`], so a schema file
/// with extra columns still indexes them sensibly.
pub fn kind_for_name(name: &str) -> ColumnKind {
    COLUMN_KINDS
        .get(name)
        .copied()
        .unwrap_or(ColumnKind::Categorical)
}

/// A single column declaration: name plus semantic kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    kind: ColumnKind,
}

impl Column {
    /// Creates a column with the kind inferred from its name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = kind_for_name(&name);
        Self { name, kind }
    }

    /// The column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The semantic kind of this column.
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }
}

/// An ordered set of column declarations describing one log layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSchema {
    columns: Vec<Column>,
}

impl LogSchema {
    /// Builds a schema from an ordered list of column names.
    ///
    /// Kinds are inferred per name via [`kind_for_name`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(Column::named).collect(),
        }
    }

    /// Loads a schema from a whitespace-separated schema file.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SchemaNotFound`] if the file does not exist and
    /// [`DataError::EmptySchema`] if it contains no column names.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::SchemaNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)?;
        let names: Vec<&str> = text.split_whitespace().collect();
        if names.is_empty() {
            return Err(DataError::EmptySchema {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_names(names))
    }

    /// The built-in 24-column iPinYou base schema.
    pub fn ipinyou() -> Self {
        Self::from_names(IPINYOU_COLUMNS)
    }

    /// The labeled layout derived from this raw layout:
    /// `click`, `weekday`, `hour`, then every raw column in order.
    pub fn labeled(&self) -> Self {
        let mut columns = Vec::with_capacity(self.columns.len() + 3);
        columns.push(Column::named("click"));
        columns.push(Column::named("weekday"));
        columns.push(Column::named("hour"));
        columns.extend(self.columns.iter().cloned());
        Self { columns }
    }

    /// This layout with the test-round feedback columns appended.
    pub fn with_feedback(&self) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(FEEDBACK_COLUMNS.iter().copied().map(Column::named));
        Self { columns }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema declares no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The ordered column declarations.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The ordered column names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// The tab-joined header line for files using this layout.
    pub fn header(&self) -> String {
        self.names().collect::<Vec<_>>().join("\t")
    }

    /// Position of a column by name, if declared.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of a column that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingColumn`] if the column is not declared.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| DataError::MissingColumn {
            name: name.to_string(),
        })
    }

    /// The kind of the column at `index`.
    pub fn kind(&self, index: usize) -> Option<ColumnKind> {
        self.columns.get(index).map(|c| c.kind)
    }

    /// Position of the click label column.
    pub fn label_index(&self) -> Result<usize> {
        self.require("click")
    }

    /// Position of the clearing (winning) price column.
    pub fn price_index(&self) -> Result<usize> {
        self.require("payprice")
    }

    /// Position of the advertiser/campaign id column.
    pub fn advertiser_index(&self) -> Result<usize> {
        self.require("advertiser")
    }

    /// Position of the bid identifier column (part of the join key).
    pub fn bid_index(&self) -> Result<usize> {
        self.require("bidid")
    }

    /// Position of the auction timestamp column.
    pub fn timestamp_index(&self) -> Result<usize> {
        self.require("timestamp")
    }

    /// Position of the creative id column (part of the join key).
    pub fn creative_index(&self) -> Result<usize> {
        self.require("creative")
    }

    /// Position of the raw user-agent column.
    pub fn useragent_index(&self) -> Result<usize> {
        self.require("useragent")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_ipinyou_preset_layout() {
        let schema = LogSchema::ipinyou();
        assert_eq!(schema.len(), 24);
        assert_eq!(schema.index_of("bidid"), Some(0));
        assert_eq!(schema.timestamp_index().unwrap(), 1);
        assert_eq!(schema.creative_index().unwrap(), 18);
        assert_eq!(schema.price_index().unwrap(), 20);
    }

    #[test]
    fn test_labeled_positional_contract() {
        let labeled = LogSchema::ipinyou().labeled();
        assert_eq!(labeled.len(), 27);
        assert_eq!(labeled.label_index().unwrap(), 0);
        assert_eq!(labeled.useragent_index().unwrap(), 7);
        assert_eq!(labeled.price_index().unwrap(), 23);
        assert_eq!(labeled.advertiser_index().unwrap(), 25);
        assert_eq!(labeled.index_of("usertag"), Some(26));
    }

    #[test]
    fn test_feedback_columns_appended() {
        let schema = LogSchema::ipinyou().with_feedback();
        assert_eq!(schema.len(), 26);
        assert_eq!(schema.index_of("nclick"), Some(24));
        assert_eq!(schema.index_of("nconversation"), Some(25));
    }

    #[test]
    fn test_kinds() {
        let schema = LogSchema::ipinyou();
        assert_eq!(schema.kind(4), Some(ColumnKind::UserAgent));
        assert_eq!(schema.kind(17), Some(ColumnKind::PriceBucket));
        assert_eq!(schema.kind(23), Some(ColumnKind::MultiValue));
        assert!(!ColumnKind::Identifier.is_indexed());
        assert!(ColumnKind::Categorical.is_indexed());
    }

    #[test]
    fn test_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "bidid timestamp useragent payprice advertiser").unwrap();
        let schema = LogSchema::from_file(f.path()).unwrap();
        assert_eq!(schema.len(), 5);
        assert_eq!(schema.price_index().unwrap(), 3);
        // Unknown names default to categorical.
        assert_eq!(kind_for_name("mystery"), ColumnKind::Categorical);
    }

    #[test]
    fn test_missing_schema_file() {
        let err = LogSchema::from_file("/nonexistent/schema.txt").unwrap_err();
        assert!(matches!(err, DataError::SchemaNotFound { .. }));
    }

    #[test]
    fn test_missing_column() {
        let schema = LogSchema::from_names(["bidid", "timestamp"]);
        let err = schema.advertiser_index().unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }
}
