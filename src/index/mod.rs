//! The aligned pair of vector index and metadata store.
//!
//! Vectors and records are joined by position, never by id. The only way to
//! get a [`SimilarityIndex`] is through a constructor that checks both sides
//! have the same length, so a misaligned pair cannot exist in memory.

mod metadata;

pub use metadata::MetadataStore;

use crate::error::{IndexError, IndexResult};
use crate::types::{Position, Record};
use crate::vector::{FlatIndex, Neighbor, VectorDimension};

/// A ranked query result joined back to its record.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub position: Position,
    pub distance: f32,
    pub record: &'a Record,
}

/// Vector index and metadata store with a checked length pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityIndex {
    vectors: FlatIndex,
    metadata: MetadataStore,
}

impl SimilarityIndex {
    /// Pair vectors with records, failing if the counts differ.
    pub fn new(vectors: FlatIndex, metadata: MetadataStore) -> IndexResult<Self> {
        if vectors.len() != metadata.len() {
            return Err(IndexError::Misaligned {
                vectors: vectors.len(),
                records: metadata.len(),
            });
        }
        Ok(Self { vectors, metadata })
    }

    /// Build from raw embeddings and their records in corpus order.
    pub fn build(embeddings: &[Vec<f32>], records: Vec<Record>) -> IndexResult<Self> {
        if embeddings.len() != records.len() {
            return Err(IndexError::Misaligned {
                vectors: embeddings.len(),
                records: records.len(),
            });
        }
        let vectors = FlatIndex::build(embeddings)?;
        Self::new(vectors, MetadataStore::new(records))
    }

    /// Top-k neighbors of `vector` joined to their records.
    pub fn search(&self, vector: &[f32], k: usize) -> IndexResult<Vec<SearchHit<'_>>> {
        let neighbors = self.vectors.query(vector, k)?;
        neighbors
            .into_iter()
            .map(|Neighbor { position, distance }| {
                let record = self.metadata.get(position)?;
                Ok::<_, IndexError>(SearchHit {
                    position,
                    distance,
                    record,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> VectorDimension {
        self.vectors.dimension()
    }

    pub fn vectors(&self) -> &FlatIndex {
        &self.vectors
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }
}
