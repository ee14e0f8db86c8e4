//! Atomic save and validated load of a [`SimilarityIndex`].
//!
//! A save writes a new generation of data files next to the current ones,
//! then replaces `manifest.json`. Each file goes through a temp file in the
//! same directory, is fsynced, and is renamed into place, so the manifest
//! rename is the single commit point. Files of older generations are removed
//! after the commit.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::format::{self, HashingWriter, sha256_hex};
use super::manifest::{IndexManifest, MANIFEST_FILE};
use super::{StorageError, StorageResult};
use crate::index::{MetadataStore, SimilarityIndex};
use crate::types::Record;

/// Records file contents, in position order.
#[derive(Debug, Serialize, Deserialize)]
struct RecordsFile {
    version: u32,
    count: usize,
    records: Vec<Record>,
}

const RECORDS_VERSION: u32 = 1;

/// Manages persistence of the index
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    base_path: PathBuf,
}

impl IndexPersistence {
    /// Create a new persistence manager
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Check if a published index exists
    pub fn exists(&self) -> bool {
        IndexManifest::exists(&self.base_path)
    }

    /// Manifest of the currently published generation.
    pub fn manifest(&self) -> StorageResult<IndexManifest> {
        IndexManifest::load(&self.base_path)
    }

    /// Publish `index` as the next generation.
    ///
    /// On any failure the previously published index, if there is one, is
    /// still what [`load`](Self::load) returns and no new-generation files
    /// remain.
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, index: &SimilarityIndex, model_id: &str) -> StorageResult<IndexManifest> {
        self.publish(
            model_id,
            index.dimension().get(),
            index.len(),
            |w| format::write_vectors(w, index.vectors()),
            |w| write_records(w, index.metadata()),
        )
    }

    fn publish<V, R>(
        &self,
        model_id: &str,
        dimension: usize,
        count: usize,
        write_vectors: V,
        write_records: R,
    ) -> StorageResult<IndexManifest>
    where
        V: FnOnce(&mut dyn Write) -> std::io::Result<()>,
        R: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        fs::create_dir_all(&self.base_path).map_err(StorageError::io(&self.base_path))?;

        let generation = match self.manifest() {
            Ok(previous) => previous.generation + 1,
            Err(StorageError::NotFound { .. }) => 1,
            Err(e) => {
                tracing::warn!(error = %e, "previous manifest unreadable, starting a new generation sequence");
                1
            }
        };
        let vectors_file = format!("vectors.{generation}.bin");
        let records_file = format!("records.{generation}.json");

        let mut staged = StagedFiles::default();
        let (path, vectors_sha256) = self.write_file(&vectors_file, write_vectors)?;
        staged.push(path);
        let (path, records_sha256) = self.write_file(&records_file, write_records)?;
        staged.push(path);

        let manifest = IndexManifest {
            format_version: IndexManifest::CURRENT_VERSION,
            generation,
            model: model_id.to_string(),
            dimension,
            count,
            vectors_file,
            records_file,
            vectors_sha256,
            records_sha256,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Commit point: after this rename readers see the new generation.
        self.write_file(MANIFEST_FILE, |w| w.write_all(&json))?;
        staged.commit();
        sync_dir(&self.base_path);

        tracing::info!(
            generation,
            count,
            dimension,
            path = %self.base_path.display(),
            "published index"
        );
        self.remove_stale(&manifest);
        Ok(manifest)
    }

    /// Write one file through a synced temp file and rename it into place.
    /// Returns the final path and the hex SHA-256 of its contents.
    fn write_file<F>(&self, name: &str, write: F) -> StorageResult<(PathBuf, String)>
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        let target = self.base_path.join(name);
        let mut tmp =
            NamedTempFile::new_in(&self.base_path).map_err(StorageError::io(&self.base_path))?;

        let digest = {
            let mut writer = HashingWriter::new(BufWriter::new(tmp.as_file_mut()));
            write(&mut writer).map_err(StorageError::io(&target))?;
            let (mut buffered, digest) = writer.finish();
            buffered.flush().map_err(StorageError::io(&target))?;
            digest
        };
        tmp.as_file().sync_all().map_err(StorageError::io(&target))?;
        tmp.persist(&target)
            .map_err(|e| StorageError::io(&target)(e.error))?;

        Ok((target, digest))
    }

    /// Remove data files of older generations.
    ///
    /// Only `vectors.<generation>.bin` and `records.<generation>.json` are
    /// candidates; anything else in the directory belongs to someone else.
    /// Unpersisted temp files remove themselves on drop.
    fn remove_stale(&self, current: &IndexManifest) {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "could not list index directory for cleanup");
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let stale = artifact_generation(name)
                .is_some_and(|generation| generation != current.generation);
            if !stale {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!(file = name, error = %e, "failed to remove stale index file");
            } else {
                tracing::debug!(file = name, "removed stale index file");
            }
        }
    }

    /// Load the published index, validating every artifact against the
    /// manifest.
    pub fn load(&self) -> StorageResult<(SimilarityIndex, IndexManifest)> {
        let manifest = self.manifest()?;

        let vectors_path = self.base_path.join(&manifest.vectors_file);
        let vectors = {
            let file = open_artifact(&vectors_path)?;
            let len = file
                .metadata()
                .map_err(StorageError::io(&vectors_path))?
                .len();
            if len < format::HEADER_SIZE as u64 {
                return Err(StorageError::corrupted(
                    &vectors_path,
                    format!("file is {len} bytes, too small to contain a header"),
                ));
            }
            // The file is never modified after publication; saves write new names.
            let mmap = unsafe { Mmap::map(&file) }.map_err(StorageError::io(&vectors_path))?;

            if sha256_hex(&mmap) != manifest.vectors_sha256 {
                return Err(StorageError::corrupted(&vectors_path, "checksum mismatch"));
            }
            let (header, vectors) = format::read_vectors(&mmap)
                .map_err(|reason| StorageError::corrupted(&vectors_path, reason))?;
            if header.dimension as usize != manifest.dimension
                || header.count as usize != manifest.count
            {
                return Err(StorageError::corrupted(
                    &vectors_path,
                    format!(
                        "header says {} vectors of dimension {}, manifest says {} of dimension {}",
                        header.count, header.dimension, manifest.count, manifest.dimension
                    ),
                ));
            }
            vectors
        };

        let records_path = self.base_path.join(&manifest.records_file);
        let bytes = fs::read(&records_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                StorageError::corrupted(&records_path, "file named by the manifest is missing")
            }
            _ => StorageError::io(&records_path)(e),
        })?;
        if sha256_hex(&bytes) != manifest.records_sha256 {
            return Err(StorageError::corrupted(&records_path, "checksum mismatch"));
        }
        let records: RecordsFile = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupted(&records_path, e.to_string()))?;
        if records.version != RECORDS_VERSION {
            return Err(StorageError::VersionMismatch {
                path: records_path,
                found: records.version,
                supported: RECORDS_VERSION,
            });
        }
        if records.count != records.records.len() || records.count != vectors.len() {
            return Err(StorageError::corrupted(
                &records_path,
                format!(
                    "{} records (declared {}) for {} vectors",
                    records.records.len(),
                    records.count,
                    vectors.len()
                ),
            ));
        }

        let index = SimilarityIndex::new(vectors, MetadataStore::new(records.records))
            .map_err(|e| StorageError::corrupted(&records_path, e.to_string()))?;

        tracing::debug!(
            generation = manifest.generation,
            count = index.len(),
            "loaded index"
        );
        Ok((index, manifest))
    }
}

fn write_records(writer: &mut dyn Write, metadata: &MetadataStore) -> std::io::Result<()> {
    #[derive(Serialize)]
    struct RecordsRef<'a> {
        version: u32,
        count: usize,
        records: &'a [Record],
    }

    serde_json::to_writer(
        writer,
        &RecordsRef {
            version: RECORDS_VERSION,
            count: metadata.len(),
            records: metadata.as_slice(),
        },
    )
    .map_err(std::io::Error::other)
}

/// Generation number of a file named `vectors.<n>.bin` or `records.<n>.json`.
fn artifact_generation(name: &str) -> Option<u64> {
    let number = name
        .strip_prefix("vectors.")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .or_else(|| {
            name.strip_prefix("records.")
                .and_then(|rest| rest.strip_suffix(".json"))
        })?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse().ok()
}

fn open_artifact(path: &Path) -> StorageResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            StorageError::corrupted(path, "file named by the manifest is missing")
        }
        _ => StorageError::io(path)(e),
    })
}

/// Make the renames durable.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to sync index directory");
    }
}

/// Files of an uncommitted generation, removed on drop unless committed.
#[derive(Default)]
struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn commit(&mut self) {
        self.paths.clear();
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to discard staged file");
            }
        }
    }
}
