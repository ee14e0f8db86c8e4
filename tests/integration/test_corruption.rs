//! Damaged index directories must be rejected on open.

use crate::common::{PAPERS_CSV, TestProject, fast_options, papers_provider, pipeline_with};
use insight_index::io::ExitCode;
use insight_index::{ErrorCategory, IndexError, IndexManifest, ReadyIndex, StorageError};
use sha2::{Digest, Sha256};
use std::fs;
use std::sync::Arc;

fn built_project() -> (TestProject, IndexManifest) {
    let project = TestProject::new();
    let corpus = project.add_file("papers.csv", PAPERS_CSV);
    pipeline_with(Arc::new(papers_provider()), fast_options(), &project.index_dir())
        .run(&corpus)
        .unwrap();
    let manifest = IndexManifest::load(&project.index_dir()).unwrap();
    (project, manifest)
}

fn open(project: &TestProject) -> Result<ReadyIndex, IndexError> {
    ReadyIndex::open(&project.index_dir(), Arc::new(papers_provider()))
}

fn write_manifest(project: &TestProject, manifest: &IndexManifest) {
    fs::write(
        project.index_dir().join("manifest.json"),
        serde_json::to_string_pretty(manifest).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_truncated_vectors_are_corruption() {
    let (project, manifest) = built_project();
    let path = project.index_dir().join(&manifest.vectors_file);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

    let err = open(&project).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Corruption);
    assert_eq!(ExitCode::from_error(&err), ExitCode::IndexCorrupted);
}

#[test]
fn test_dropped_record_is_count_mismatch() {
    let (project, mut manifest) = built_project();
    let path = project.index_dir().join(&manifest.records_file);

    // Remove one record but keep the file self-consistent and the checksum valid,
    // so only the vector/record count check can catch it.
    let mut records: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    records["records"].as_array_mut().unwrap().pop();
    records["count"] = serde_json::json!(2);
    let bytes = serde_json::to_vec(&records).unwrap();
    fs::write(&path, &bytes).unwrap();
    manifest.records_sha256 = format!("{:x}", Sha256::digest(&bytes));
    write_manifest(&project, &manifest);

    match open(&project).unwrap_err() {
        IndexError::Storage(StorageError::Corrupted { reason, .. }) => {
            assert!(reason.contains("2 records"), "unexpected reason: {reason}");
        }
        other => panic!("Expected corruption, got {other:?}"),
    }
}

#[test]
fn test_manifest_dimension_disagreeing_with_header() {
    let (project, mut manifest) = built_project();
    manifest.dimension = 3;
    write_manifest(&project, &manifest);

    assert_eq!(open(&project).unwrap_err().category(), ErrorCategory::Corruption);
}

#[test]
fn test_flipped_vector_byte_fails_checksum() {
    let (project, manifest) = built_project();
    let path = project.index_dir().join(&manifest.vectors_file);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    match open(&project).unwrap_err() {
        IndexError::Storage(StorageError::Corrupted { reason, .. }) => {
            assert_eq!(reason, "checksum mismatch")
        }
        other => panic!("Expected corruption, got {other:?}"),
    }
}

#[test]
fn test_missing_index_is_not_found() {
    let project = TestProject::new();
    let err = open(&project).unwrap_err();
    assert!(matches!(err, IndexError::Storage(StorageError::NotFound { .. })));
    assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
}
