//! Semantic search service for paper retrieval.
//!
//! Provides a high-level interface for semantic search operations:
//! - Lazy-loads the embedding model on first use
//! - Encodes the query text and hands the vector to the ranker
//! - Thread-safe with interior mutability for lazy initialization

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::catalog::RecordStore;
use crate::config::SemanticSearchConfig;
use crate::semantic::embeddings::{model_id_hash, Encoder, EncodingError};
use crate::semantic::ranker::{SearchError, SearchResults, SimilarityRanker};
use crate::semantic::EmbeddingModel;

/// Encoder that loads the configured fastembed model on first use.
pub struct LazyEncoder {
    config: SemanticSearchConfig,
    base_path: PathBuf,
    model_id: [u8; 32],
    /// Uses Mutex<Option<_>> instead of OnceLock because get_or_try_init is unstable.
    model: Mutex<Option<EmbeddingModel>>,
}

impl LazyEncoder {
    /// Validates the model name up front; the model itself is loaded lazily.
    pub fn new(config: SemanticSearchConfig, base_path: PathBuf) -> Result<Self, EncodingError> {
        let canonical = EmbeddingModel::canonical_name(&config.model)?;

        Ok(Self {
            model_id: model_id_hash(canonical),
            config,
            base_path,
            model: Mutex::new(None),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.model
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn with_model<R>(
        &self,
        f: impl FnOnce(&EmbeddingModel) -> Result<R, EncodingError>,
    ) -> Result<R, EncodingError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|e| EncodingError::Failed(format!("Lock poisoned: {}", e)))?;

        if guard.is_none() {
            log::info!(
                "Initializing semantic search with model '{}'",
                self.config.model
            );
            let timeout = Duration::from_secs(self.config.download_timeout_secs);
            let model =
                EmbeddingModel::new(&self.config.model, self.base_path.clone(), Some(timeout))?;
            log::debug!(
                "model '{}' ready, {} dimensions",
                model.name(),
                model.dimensions()
            );
            *guard = Some(model);
        }

        match guard.as_ref() {
            Some(model) => f(model),
            None => Err(EncodingError::Unavailable("model not initialized".to_string())),
        }
    }
}

impl Encoder for LazyEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        // don't pay for a model load on input that can never be embedded
        if text.trim().is_empty() {
            return Err(EncodingError::EmptyInput);
        }
        self.with_model(|model| model.encode(text))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.with_model(|model| model.encode_batch(texts))
    }

    fn model_id(&self) -> [u8; 32] {
        self.model_id
    }
}

/// Free-text search over the papers of a record store.
pub struct SemanticSearchService<'a> {
    store: &'a dyn RecordStore,
    encoder: &'a dyn Encoder,
}

impl<'a> SemanticSearchService<'a> {
    pub fn new(store: &'a dyn RecordStore, encoder: &'a dyn Encoder) -> Self {
        Self { store, encoder }
    }

    /// Encode `query` and return the `top_k` most similar papers.
    ///
    /// `top_k` is checked before the query is encoded or the store is read.
    pub fn search(&self, query: &str, top_k: usize) -> Result<SearchResults, SearchError> {
        let _span = tracing::info_span!("semantic_search", top_k).entered();

        if top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be greater than 0".to_string(),
            ));
        }

        let query_embedding = self.encoder.encode(query.trim())?;

        let results = SimilarityRanker::new(self.store)
            .with_model(self.encoder.model_id())
            .search(&query_embedding, top_k)?;

        log::info!(
            "query {:?} matched {} papers ({} skipped)",
            query.trim(),
            results.hits.len(),
            results.skipped
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(model: &str) -> SemanticSearchConfig {
        SemanticSearchConfig {
            model: model.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lazy_encoder_rejects_unknown_model() {
        let result = LazyEncoder::new(test_config("word2vec"), PathBuf::from("/tmp"));
        assert!(matches!(result, Err(EncodingError::InvalidModel(_))));
    }

    #[test]
    fn test_lazy_encoder_not_loaded_initially() {
        let encoder =
            LazyEncoder::new(test_config("bge-small-en-v1.5"), PathBuf::from("/tmp")).unwrap();
        assert!(!encoder.is_loaded());
        assert_eq!(encoder.model_id(), model_id_hash("bge-small-en-v1.5"));
    }

    #[test]
    fn test_lazy_encoder_empty_query_skips_model_load() {
        let encoder =
            LazyEncoder::new(test_config("bge-small-en-v1.5"), PathBuf::from("/tmp")).unwrap();

        assert!(matches!(encoder.encode("  "), Err(EncodingError::EmptyInput)));
        assert!(!encoder.is_loaded());
    }

    #[test]
    fn test_model_id_uses_canonical_name() {
        let encoder =
            LazyEncoder::new(test_config("BAAI/bge-small-en-v1.5"), PathBuf::from("/tmp")).unwrap();
        assert_eq!(encoder.model_id(), model_id_hash("bge-small-en-v1.5"));
    }
}
