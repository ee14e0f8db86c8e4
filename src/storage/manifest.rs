//! The manifest names the current generation's files and their checksums.
//!
//! Replacing `manifest.json` is the commit point of a save: readers always
//! see either the previous complete index or the new one.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::StorageError;

/// Manifest file name inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Description of one published index generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Version of the on-disk layout
    pub format_version: u32,

    /// Increments with every successful save into the same directory
    pub generation: u64,

    /// Embedding model the vectors came from
    pub model: String,

    pub dimension: usize,

    /// Number of vectors, equal to the number of records
    pub count: usize,

    pub vectors_file: String,
    pub records_file: String,

    /// Hex SHA-256 of the vector file
    pub vectors_sha256: String,

    /// Hex SHA-256 of the records file
    pub records_sha256: String,

    /// RFC 3339 creation time
    pub created_at: String,
}

impl IndexManifest {
    /// Current layout version
    pub const CURRENT_VERSION: u32 = 1;

    /// Load and version-check the manifest of `dir`.
    pub fn load(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(MANIFEST_FILE);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    path: dir.to_path_buf(),
                });
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        let manifest: Self =
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupted {
                path: path.clone(),
                reason: format!("unreadable manifest: {e}"),
            })?;

        if manifest.format_version != Self::CURRENT_VERSION {
            return Err(StorageError::VersionMismatch {
                path,
                found: manifest.format_version,
                supported: Self::CURRENT_VERSION,
            });
        }

        for name in [&manifest.vectors_file, &manifest.records_file] {
            if !is_plain_file_name(name) {
                return Err(StorageError::Corrupted {
                    path,
                    reason: format!("manifest references '{name}' outside the index directory"),
                });
            }
        }

        Ok(manifest)
    }

    /// Check if a manifest exists in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).exists()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && Path::new(name).file_name().is_some_and(|f| f == name)
}
