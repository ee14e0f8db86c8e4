//! Semantic similarity index over a tabular document corpus.
//!
//! A corpus of records (id, title, abstract, optional summary) is embedded
//! with an [`EmbeddingProvider`], indexed for exact squared-L2 nearest
//! neighbor search, and persisted. A [`ReadyIndex`] later answers top-k
//! "similar documents" queries against the persisted index.

pub mod config;
pub mod corpus;
pub mod display;
pub mod error;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod query;
pub mod storage;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use corpus::{ColumnMapping, CorpusError, CorpusFormat, CorpusLoader};
pub use error::{ErrorCategory, IndexError, IndexResult};
pub use index::{MetadataStore, SearchHit, SimilarityIndex};
pub use pipeline::{
    BuildCanceller, BuildOptions, BuildPipeline, BuildProgress, BuildReport, BuildState,
    ProgressFn,
};
pub use query::{ReadyIndex, SimilarRecord};
pub use storage::{IndexManifest, IndexPersistence, StorageError};
pub use types::{Position, Record, RecordId};
pub use vector::{
    EmbeddingProvider, FastEmbedProvider, FlatIndex, Neighbor, ProviderError,
    StaticEmbeddingProvider, VectorDimension, VectorError,
};
