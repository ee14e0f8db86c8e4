//! Vector search functionality.
//!
//! Embeddings live in a flat row-major array and are searched exhaustively
//! by squared L2 distance. Exact search keeps results reproducible and free
//! of recall loss at the cost of O(N·D) per query.

mod embedding;
mod flat;
mod types;

pub use embedding::{
    EmbeddingProvider, FastEmbedProvider, ProviderError, StaticEmbeddingProvider,
    embed_with_timeout, parse_embedding_model,
};
pub use flat::{FlatIndex, Neighbor, squared_l2};
pub use types::{VectorDimension, VectorError};
