//! Log joining, feature indexing, and sparse vectorization for RTB logs.
//!
//! This crate turns raw real-time-bidding auction logs (impressions,
//! clicks, bid/win prices) into machine-learning-ready datasets:
//! per-impression feature vectors with a click label and a clearing
//! price, partitioned by advertiser.
//!
//! # Data flow
//!
//! ```text
//! raw text logs
//!   └─ loader   — schema-driven parsing into rows
//!   └─ join     — left-join impressions against the click lookup
//!   └─ split    — partition labeled rows by advertiser, train vs. test
//!   └─ index    — first-occurrence (column, value) → id, train-only
//!   └─ vectorize— labeled rows → `label price id:1 id:1 ...`
//! ```
//!
//! Everything streams row-by-row; only the click lookup (bounded by click
//! volume) and the feature index (bounded by distinct categorical values)
//! are held in memory. Feature-id assignment is deterministic in input
//! order, so identical inputs reproduce byte-identical artifacts.
//!
//! # Example
//!
//! ```no_run
//! use ipinyou_data::pipeline::{run_pipeline, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     train_impressions: vec!["data/imp.20130606.txt".into()],
//!     train_clicks: vec!["data/clk.20130606.txt".into()],
//!     test_logs: vec!["data/leaderboard.20130613.txt".into()],
//!     output_root: "out".into(),
//!     advertiser_limit: None,
//!     schema: None,
//! };
//! let report = run_pipeline(&config).unwrap();
//! println!("{} advertisers", report.partitions.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod join;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod schema;
pub mod split;
pub mod ua;
pub mod vectorize;

// Re-export main types for convenience
pub use error::{DataError, Result};
pub use index::{FeatureIndex, FeatureIndexer, FeaturePlan, IndexBuilder};
pub use join::{ClickLookup, LabelStats, Labeler};
pub use loader::{open_concat, ParseStats, RowReader};
pub use pipeline::{run_pipeline, PipelineConfig};
pub use record::{LabeledRow, RawLogRow, SparseVectorRow};
pub use report::{PartitionReport, RunReport};
pub use schema::{Column, ColumnKind, LogSchema};
pub use split::{AdvertiserSplitter, SplitStats};
pub use ua::{KeywordNormalizer, UaSignature, UserAgentNormalizer};
pub use vectorize::{VectorStats, Vectorizer};
