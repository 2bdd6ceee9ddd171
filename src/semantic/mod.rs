//! Semantic retrieval over paper embeddings.
//!
//! # Architecture
//!
//! - `embeddings`: `Encoder` contract and the fastembed-backed model
//! - `codec`: versioned, checksummed embedding blob format
//! - `ranker`: exact brute-force top-K similarity ranking
//! - `service`: lazy model loading and query-to-ranking search

pub mod codec;
pub mod embeddings;
mod ranker;
mod service;

pub use codec::{decode_embedding, encode_embedding, BlobError};
pub use embeddings::{model_id_hash, EmbeddingModel, Encoder, EncodingError};
pub use ranker::{SearchError, SearchHit, SearchResults, SimilarityRanker};
pub use service::{LazyEncoder, SemanticSearchService};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "bge-small-en-v1.5";

/// Default number of results for a semantic search
pub const DEFAULT_TOP_K: usize = 5;
