//! Corpus loading: tabular sources to ordered [`Record`](crate::types::Record)s.
//!
//! Column validation happens before the first row is read so a missing text
//! column fails the build before any embedding work starts.

mod loader;

pub use loader::{ColumnMapping, CorpusFormat, CorpusLoader};

use std::path::PathBuf;
use thiserror::Error;

use crate::types::RecordId;

/// Errors raised while reading a corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Corpus '{path}' has no '{column}' column")]
    MissingColumn { column: String, path: PathBuf },

    #[error("Corpus '{path}' contains no records")]
    Empty { path: PathBuf },

    #[error("Row {row} of '{path}' has an empty id")]
    MissingId { row: usize, path: PathBuf },

    #[error("Duplicate id '{id}' in rows {first_row} and {row} of '{path}'")]
    DuplicateId {
        id: RecordId,
        first_row: usize,
        row: usize,
        path: PathBuf,
    },

    #[error("Unsupported corpus format for '{path}': expected .csv, .jsonl, .ndjson or .json")]
    UnsupportedFormat { path: PathBuf },

    #[error("Malformed corpus '{path}' at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("Failed to read corpus '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
