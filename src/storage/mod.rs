//! On-disk representation of a built index.
//!
//! An index directory holds one vector file, one records file and a
//! `manifest.json` naming them. See [`persistence`] for the publication
//! protocol and [`format`] for the vector file layout.

pub mod format;
pub mod manifest;
pub mod persistence;

pub use manifest::{IndexManifest, MANIFEST_FILE};
pub use persistence::IndexPersistence;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No index found at '{path}'")]
    NotFound { path: PathBuf },

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Index file '{path}' is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Index at '{path}' uses format version {found}, this build supports {supported}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
