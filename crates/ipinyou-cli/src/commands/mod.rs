//! CLI Command Implementations
//!
//! This module contains the implementations for all CLI subcommands:
//!
//! - `mkdata`: impression/click joining into labeled training logs
//! - `mktest`: test-round labeling
//! - `split`: per-advertiser partitioning
//! - `yzx`: feature indexing and sparse vectorization
//! - `run`: the full pipeline

mod mkdata;
mod mktest;
mod run;
mod split;
mod yzx;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ipinyou_data::schema::LogSchema;

pub use mkdata::MkDataCommand;
pub use mktest::MkTestCommand;
pub use run::RunCommand;
pub use split::SplitCommand;
pub use yzx::YzxCommand;

/// Loads the schema file, or falls back to the built-in iPinYou layout.
pub(crate) fn load_schema(path: &Option<PathBuf>) -> Result<LogSchema> {
    match path {
        Some(path) => LogSchema::from_file(path)
            .with_context(|| format!("failed to load schema from {}", path.display())),
        None => Ok(LogSchema::ipinyou()),
    }
}
