//! Read-only query service over a persisted index.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::EmbeddingConfig;
use crate::error::{IndexError, IndexResult};
use crate::index::{SearchHit, SimilarityIndex};
use crate::storage::{IndexManifest, IndexPersistence};
use crate::types::{Position, Record};
use crate::vector::{EmbeddingProvider, ProviderError, embed_with_timeout};

/// One ranked result, owning its record so it can outlive the index borrow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarRecord {
    pub rank: usize,
    pub position: Position,
    pub distance: f32,
    #[serde(flatten)]
    pub record: Record,
}

impl SimilarRecord {
    fn from_hit(rank: usize, hit: SearchHit<'_>) -> Self {
        Self {
            rank,
            position: hit.position,
            distance: hit.distance,
            record: hit.record.clone(),
        }
    }
}

/// A loaded index plus the provider used to embed query text.
///
/// Immutable after [`open`](Self::open); share it across threads behind an
/// `Arc` without locking.
pub struct ReadyIndex {
    index: SimilarityIndex,
    manifest: IndexManifest,
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Option<Duration>,
}

impl ReadyIndex {
    /// Load the index published at `path`.
    ///
    /// Fails on any corruption the persistence layer detects, and when the
    /// index was built with a different model than `provider`.
    pub fn open(path: &Path, provider: Arc<dyn EmbeddingProvider>) -> IndexResult<Self> {
        let (index, manifest) = IndexPersistence::new(path).load()?;

        if manifest.model != provider.model_id() {
            return Err(IndexError::config(format!(
                "index at '{}' was built with model '{}' but the query provider is '{}'",
                path.display(),
                manifest.model,
                provider.model_id()
            )));
        }

        tracing::info!(
            path = %path.display(),
            records = index.len(),
            dimension = index.dimension().get(),
            generation = manifest.generation,
            "index ready"
        );
        Ok(Self {
            index,
            manifest,
            provider,
            timeout: EmbeddingConfig::default().timeout(),
        })
    }

    /// Bound each query embedding call; `None` waits for the provider.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The `k` records whose embeddings are closest to the embedding of `text`.
    pub fn similar(&self, text: &str, k: usize) -> IndexResult<Vec<SimilarRecord>> {
        if k == 0 {
            return Err(IndexError::InvalidK { k });
        }
        let texts = Arc::new(vec![text.to_string()]);
        let vector = embed_with_timeout(&self.provider, texts, self.timeout)
            .and_then(|mut vectors| {
                vectors.pop().ok_or(ProviderError::CountMismatch {
                    expected: 1,
                    actual: 0,
                })
            })
            .map_err(|source| IndexError::QueryEmbedding { source })?;
        self.similar_to_vector(&vector, k)
    }

    /// Same as [`similar`](Self::similar) for a caller-supplied embedding.
    pub fn similar_to_vector(&self, vector: &[f32], k: usize) -> IndexResult<Vec<SimilarRecord>> {
        if k == 0 {
            return Err(IndexError::InvalidK { k });
        }
        let expected = self.index.dimension().get();
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
                context: "query vector".to_string(),
            });
        }

        let hits = self.index.search(vector, k)?;
        tracing::debug!(k, returned = hits.len(), "similarity query");
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SimilarRecord::from_hit(i + 1, hit))
            .collect())
    }

    pub fn info(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl std::fmt::Debug for ReadyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyIndex")
            .field("records", &self.index.len())
            .field("manifest", &self.manifest)
            .field("provider", &self.provider.model_id())
            .field("timeout", &self.timeout)
            .finish()
    }
}
