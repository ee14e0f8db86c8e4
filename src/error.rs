//! Error types for the similarity index
//!
//! Every layer owns a focused error enum; all of them fold into [`IndexError`],
//! which is what the build pipeline, the query service and the CLI report.

use thiserror::Error;

use crate::corpus::CorpusError;
use crate::storage::StorageError;
use crate::vector::{ProviderError, VectorError};

/// Coarse classification of failures.
///
/// Callers use this to decide between "fix your input", "try again later"
/// and "rebuild the index".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing column, empty corpus, invalid `k`, bad settings.
    Configuration,
    /// Embedding provider failed after exhausting retries.
    Provider,
    /// Vector length or vector/metadata count mismatch.
    Alignment,
    /// A persisted artifact is malformed.
    Corruption,
    /// File system failure outside the persisted format itself.
    Io,
    /// The caller abandoned the build.
    Cancelled,
}

/// Main error type for build and query operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Invalid result count k={k}: k must be a positive integer")]
    InvalidK { k: usize },

    /// Provider errors
    #[error("Embedding batch {batch} failed after {attempts} attempt(s): {source}")]
    Provider {
        batch: usize,
        attempts: usize,
        source: ProviderError,
    },

    #[error("Failed to embed query text: {source}")]
    QueryEmbedding { source: ProviderError },

    #[error("Failed to load embedding model '{model}': {source}")]
    ModelLoad {
        model: String,
        source: ProviderError,
    },

    /// Dimension/alignment errors
    #[error("Dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    #[error("Vector/metadata misalignment: {vectors} vectors but {records} records")]
    Misaligned { vectors: usize, records: usize },

    #[error("Vector index error: {0}")]
    Vector(#[from] VectorError),

    /// Corruption and persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Build cancelled during {state}")]
    Cancelled { state: String },
}

impl IndexError {
    /// Shorthand for configuration failures.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// Map this error onto the failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. } | Self::InvalidK { .. } => ErrorCategory::Configuration,
            Self::Corpus(CorpusError::Io { .. }) => ErrorCategory::Io,
            Self::Corpus(_) => ErrorCategory::Configuration,
            Self::Provider { .. } | Self::QueryEmbedding { .. } | Self::ModelLoad { .. } => {
                ErrorCategory::Provider
            }
            Self::DimensionMismatch { .. } | Self::Misaligned { .. } => ErrorCategory::Alignment,
            Self::Vector(err) => match err {
                VectorError::InvalidK { .. } | VectorError::EmptyIndex => {
                    ErrorCategory::Configuration
                }
                _ => ErrorCategory::Alignment,
            },
            Self::Storage(err) => match err {
                StorageError::NotFound { .. } => ErrorCategory::Configuration,
                StorageError::Io { .. } => ErrorCategory::Io,
                _ => ErrorCategory::Corruption,
            },
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::Corpus(CorpusError::MissingColumn { .. }) => "MISSING_COLUMN",
            Self::Corpus(CorpusError::Empty { .. }) => "EMPTY_CORPUS",
            Self::Corpus(_) => "CORPUS_ERROR",
            Self::InvalidK { .. } => "INVALID_K",
            Self::Provider { .. } => "PROVIDER_ERROR",
            Self::QueryEmbedding { .. } => "QUERY_EMBEDDING_FAILED",
            Self::ModelLoad { .. } => "MODEL_LOAD_FAILED",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::Misaligned { .. } => "MISALIGNED",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Storage(StorageError::NotFound { .. }) => "INDEX_NOT_FOUND",
            Self::Storage(StorageError::Io { .. }) => "STORAGE_IO_ERROR",
            Self::Storage(StorageError::VersionMismatch { .. }) => "VERSION_MISMATCH",
            Self::Storage(_) => "INDEX_CORRUPTED",
            Self::Cancelled { .. } => "CANCELLED",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self.category() {
            ErrorCategory::Configuration => vec![
                "Check the corpus columns against the [corpus] section of settings.toml",
                "Run 'insight-index config' to see the effective settings",
                "Run 'insight-index build <CORPUS>' if no index exists yet",
            ],
            ErrorCategory::Provider => vec![
                "The embedding provider kept failing; try the command again",
                "Raise embedding.timeout_ms or embedding.max_retries if the model is slow",
            ],
            ErrorCategory::Alignment => vec![
                "All embeddings of one index must come from the same model",
                "Rebuild the index with 'insight-index build'",
            ],
            ErrorCategory::Corruption => vec![
                "Rebuild the index from the corpus with 'insight-index build'",
                "Check for disk errors or interrupted copies of the index directory",
            ],
            ErrorCategory::Io => vec![
                "Check that the path exists and you have read/write permissions",
                "Check available disk space",
            ],
            ErrorCategory::Cancelled => vec!["No index was written; start the build again"],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
