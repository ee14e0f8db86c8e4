//! Embedding providers.
//!
//! The index treats the embedding model as a black box mapping text to a
//! fixed-length vector. Providers are injected into the build pipeline and
//! the query service; nothing in the crate reaches for a global model handle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

use crate::vector::VectorDimension;

/// Failures reported by an embedding provider for one batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("embedding call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider rejected input: {0}")]
    Malformed(String),

    #[error("provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding worker stopped before answering")]
    Disconnected,

    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Ensure you have internet connection for first-time model download"
    )]
    ModelInit(String),
}

impl ProviderError {
    /// Whether the pipeline may retry the batch that produced this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ModelInit(_))
    }
}

/// Text in, fixed-length vector out.
///
/// Implementations must be deterministic for a fixed model identity and must
/// return one vector per input, in input order.
pub trait EmbeddingProvider: Send + Sync {
    /// Identity of the model; persisted with the index and checked on query.
    fn model_id(&self) -> &str;

    /// Output dimension, when known ahead of the first call.
    fn dimension(&self) -> Option<VectorDimension> {
        None
    }

    /// Embed several texts at once.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text])?;
        if vectors.len() != 1 {
            return Err(ProviderError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        vectors.pop().ok_or(ProviderError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

/// Embed `texts` with one provider call, waiting at most `timeout`.
///
/// With a timeout the call runs on a helper thread; a call that outlives
/// its deadline is left to finish in the background and its result is
/// dropped. A provider answering with the wrong number of vectors is an
/// error.
pub fn embed_with_timeout(
    provider: &Arc<dyn EmbeddingProvider>,
    texts: Arc<Vec<String>>,
    timeout: Option<Duration>,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let Some(timeout) = timeout else {
        return call_provider(provider.as_ref(), &texts);
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker = Arc::clone(provider);
    std::thread::Builder::new()
        .name("insight-embed-call".to_string())
        .spawn(move || {
            let _ = tx.send(call_provider(worker.as_ref(), &texts));
        })
        .map_err(|e| ProviderError::Transient(format!("failed to spawn embedding call: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ProviderError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ProviderError::Disconnected),
    }
}

fn call_provider(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = provider.embed_batch(&refs)?;
    if vectors.len() != texts.len() {
        return Err(ProviderError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Resolve a model name from settings to a fastembed model.
pub fn parse_embedding_model(name: &str) -> Option<EmbeddingModel> {
    let model = match name {
        "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
        "AllMiniLML6V2Q" => EmbeddingModel::AllMiniLML6V2Q,
        "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
        "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
        "BGEBaseENV15" => EmbeddingModel::BGEBaseENV15,
        "MultilingualE5Small" => EmbeddingModel::MultilingualE5Small,
        "ParaphraseMLMiniLML12V2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        _ => return None,
    };
    Some(model)
}

/// Local ONNX embeddings through fastembed.
///
/// The default model, all-MiniLM-L6-v2, produces 384-dimensional vectors.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    model_id: String,
    dimension: VectorDimension,
}

impl FastEmbedProvider {
    /// Load (downloading on first use) the named model.
    pub fn new(
        model_name: &str,
        cache_dir: Option<PathBuf>,
        show_download_progress: bool,
    ) -> Result<Self, ProviderError> {
        let model = parse_embedding_model(model_name)
            .ok_or_else(|| ProviderError::ModelInit(format!("unknown model '{model_name}'")))?;

        let mut options = InitOptions::new(model).with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let mut text_model =
            TextEmbedding::try_new(options).map_err(|e| ProviderError::ModelInit(e.to_string()))?;

        // Probe the output dimension once so every build can validate against it.
        let probe = text_model
            .embed(vec!["dimension check"], None)
            .map_err(|e| ProviderError::ModelInit(e.to_string()))?;
        let width = probe.first().map(Vec::len).unwrap_or(0);
        let dimension = VectorDimension::new(width)
            .map_err(|e| ProviderError::ModelInit(e.to_string()))?;

        tracing::debug!(model = model_name, dimension = width, "embedding model ready");

        Ok(Self {
            model: Mutex::new(text_model),
            model_id: model_name.to_string(),
            dimension,
        })
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> Option<VectorDimension> {
        Some(self.dimension)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self.model.lock().map_err(|_| {
            ProviderError::Transient(
                "Failed to acquire embedding model lock - model may be poisoned".to_string(),
            )
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| ProviderError::Transient(format!("Failed to generate embeddings: {e}")))
    }
}

/// Provider backed by a fixed text-to-vector table.
///
/// Useful for tests and offline runs where the vectors are known up front.
/// Text without an entry is reported as malformed input.
#[derive(Debug, Default)]
pub struct StaticEmbeddingProvider {
    model_id: String,
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StaticEmbeddingProvider {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Register the vector returned for `text`.
    #[must_use]
    pub fn with_entry(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.table.insert(text.into(), vector);
        self
    }

    /// Number of `embed_batch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for StaticEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(*text)
                    .cloned()
                    .ok_or_else(|| ProviderError::Malformed(format!("no embedding for '{text}'")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_returns_table_entries_in_order() {
        let provider = StaticEmbeddingProvider::new("static")
            .with_entry("a", vec![1.0, 0.0])
            .with_entry("b", vec![0.0, 1.0]);

        let vectors = provider.embed_batch(&["b", "a", "b"]).unwrap();
        assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(provider.embed("a").unwrap(), vec![1.0, 0.0]);
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn test_static_provider_unknown_text() {
        let provider = StaticEmbeddingProvider::new("static");
        let err = provider.embed("missing").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_model_init_is_not_retryable() {
        assert!(!ProviderError::ModelInit("x".to_string()).is_retryable());
        assert!(ProviderError::Timeout { after_ms: 5 }.is_retryable());
    }

    /// Sleeps before answering every call with a 1-d vector.
    struct SlowProvider(Duration);

    impl EmbeddingProvider for SlowProvider {
        fn model_id(&self) -> &str {
            "slow"
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
            std::thread::sleep(self.0);
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[test]
    fn test_embed_with_timeout_gives_up_on_slow_provider() {
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::new(SlowProvider(Duration::from_millis(500)));
        let texts = Arc::new(vec!["late".to_string()]);

        let err = embed_with_timeout(&provider, texts, Some(Duration::from_millis(20))).unwrap_err();
        assert_eq!(err, ProviderError::Timeout { after_ms: 20 });
    }

    #[test]
    fn test_embed_with_timeout_passes_fast_results_through() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(SlowProvider(Duration::ZERO));
        let texts = Arc::new(vec!["a".to_string(), "b".to_string()]);

        let vectors = embed_with_timeout(&provider, Arc::clone(&texts), Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(embed_with_timeout(&provider, texts, None).unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_vector_count_is_reported() {
        struct Forgetful;
        impl EmbeddingProvider for Forgetful {
            fn model_id(&self) -> &str {
                "forgetful"
            }
            fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
                Ok(vec![vec![1.0]])
            }
        }

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(Forgetful);
        let texts = Arc::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            embed_with_timeout(&provider, texts, Some(Duration::from_secs(5))).unwrap_err(),
            ProviderError::CountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_parse_embedding_model() {
        assert!(parse_embedding_model("AllMiniLML6V2").is_some());
        assert!(parse_embedding_model("gpt-embeddings").is_none());
    }
}
