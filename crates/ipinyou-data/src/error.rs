//! Error types for the ipinyou-data library.
//!
//! This module defines the error types used throughout the crate,
//! providing structured error handling with detailed context. Recoverable
//! row-level problems (malformed lines, unindexed values) are *not* errors;
//! they are skipped and counted in per-stage statistics. Only conditions
//! that invalidate a whole run surface here.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for ipinyou-data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input file does not exist.
    ///
    /// Raised before any output is written, so a failed run never leaves
    /// a partial artifact tree behind.
    #[error("missing required input file: {path}")]
    MissingInput {
        /// The path that was expected to exist.
        path: PathBuf,
    },

    /// The schema file could not be found.
    #[error("schema file not found: {path}")]
    SchemaNotFound {
        /// The schema path that was provided.
        path: PathBuf,
    },

    /// The schema file contained no column names.
    #[error("schema file is empty: {path}")]
    EmptySchema {
        /// The schema path that was provided.
        path: PathBuf,
    },

    /// A column required by the current operation is absent from the schema.
    #[error("required column not found in schema: {name}")]
    MissingColumn {
        /// The name of the missing column.
        name: String,
    },

    /// A labeled log file had no header line.
    #[error("empty or missing header in {path}")]
    EmptyHeader {
        /// The file whose header was empty.
        path: PathBuf,
    },

    /// A persisted feature index failed validation on load.
    #[error("corrupt feature index {path}: {message}")]
    CorruptIndex {
        /// The index file being loaded.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Error serializing or deserializing a report or config.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for ipinyou-data operations.
pub type Result<T> = std::result::Result<T, DataError>;
