//! Embedding model wrapper for fastembed.
//!
//! Provides the `Encoder` contract used by the ranker and its fastembed-backed
//! implementation:
//! - Model loading with configurable cache directory and a load deadline
//! - L2-normalized query and batch embeddings
//! - Model identity hash stored alongside every embedding blob

use fastembed::{InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::Duration;

/// Default download timeout for model files (5 minutes)
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding model unavailable: {0}")]
    Unavailable(String),

    #[error("embedding generation failed: {0}")]
    Failed(String),

    #[error("invalid model name: {0}")]
    InvalidModel(String),
}

/// Turns text into unit-length vectors.
///
/// Implementations must be deterministic for a fixed model and must produce
/// vectors comparable with the ones stored at ingestion time.
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError>;

    /// Encode several texts at once. Fails as a whole if any text fails.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        texts.iter().map(|text| self.encode(text)).collect()
    }

    /// SHA256 of the model name; stored in every blob this model produces.
    fn model_id(&self) -> [u8; 32];
}

/// SHA256 hash of a model name.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm >= f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Run a model load on its own thread and give up after `timeout`.
///
/// fastembed downloads synchronously with no deadline of its own. On expiry the
/// loader thread is left to finish and its result is dropped.
fn run_with_timeout<T, F>(timeout: Duration, load: F) -> Result<T, EncodingError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EncodingError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("model-loader".to_string())
        .spawn(move || {
            let _ = tx.send(load());
        })
        .map_err(|e| EncodingError::Unavailable(format!("Failed to spawn model loader: {}", e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EncodingError::Unavailable(format!(
            "model load timed out after {}s",
            timeout.as_secs()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(EncodingError::Unavailable(
            "model loader exited without a result".to_string(),
        )),
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load the named model, downloading it into `cache_dir/models` on first use.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EncodingError> {
        let (model_enum, canonical) = Self::parse_model_name(model_name)?;
        let timeout = download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EncodingError::Unavailable(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let (model, dimensions) = run_with_timeout(timeout, move || {
            let mut model = TextEmbedding::try_new(options)
                .map_err(|e| EncodingError::Unavailable(e.to_string()))?;
            let dimensions = Self::probe_dimensions(&mut model)?;
            Ok((model, dimensions))
        })?;

        log::info!("Loaded embedding model '{canonical}' ({dimensions} dimensions)");

        Ok(Self {
            model: Mutex::new(model),
            model_name: canonical.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Parse model name string to fastembed enum and its canonical name.
    fn parse_model_name(
        name: &str,
    ) -> Result<(fastembed::EmbeddingModel, &'static str), EncodingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => {
                Ok((fastembed::EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2"))
            }
            "bge-small-en-v1.5" | "bgesmallenv15" | "baai/bge-small-en-v1.5" => {
                Ok((fastembed::EmbeddingModel::BGESmallENV15, "bge-small-en-v1.5"))
            }
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok((fastembed::EmbeddingModel::BGESmallENV15Q, "bge-small-en-v1.5-q"))
            }
            "bge-base-en-v1.5" | "bgebaseenv15" | "baai/bge-base-en-v1.5" => {
                Ok((fastembed::EmbeddingModel::BGEBaseENV15, "bge-base-en-v1.5"))
            }
            "bge-large-en-v1.5" | "bgelargeenv15" | "baai/bge-large-en-v1.5" => {
                Ok((fastembed::EmbeddingModel::BGELargeENV15, "bge-large-en-v1.5"))
            }
            _ => Err(EncodingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                name
            ))),
        }
    }

    /// Canonical model name for a configured name, used to derive the model id
    /// without loading the model.
    pub fn canonical_name(name: &str) -> Result<&'static str, EncodingError> {
        Self::parse_model_name(name).map(|(_, canonical)| canonical)
    }

    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EncodingError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            EncodingError::Unavailable(format!("Failed to probe dimensions: {}", e))
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EncodingError::Unavailable("Model returned no embedding".to_string()))
    }
}

impl Encoder for EmbeddingModel {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        if text.trim().is_empty() {
            return Err(EncodingError::EmptyInput);
        }

        let mut model = self.model.lock().map_err(|e| {
            EncodingError::Failed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EncodingError::Failed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .map(l2_normalize)
            .ok_or_else(|| EncodingError::Failed("No embedding returned".to_string()))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EncodingError::EmptyInput);
        }

        let mut model = self.model.lock().map_err(|e| {
            EncodingError::Failed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EncodingError::Failed(e.to_string()))?;

        Ok(embeddings.into_iter().map(l2_normalize).collect())
    }

    fn model_id(&self) -> [u8; 32] {
        model_id_hash(&self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("BAAI/bge-small-en-v1.5", temp_dir.path().to_path_buf(), None)
            .unwrap();

        assert_eq!(model.name(), "bge-small-en-v1.5");
        assert_eq!(model.dimensions(), 384);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_is_normalized() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("bge-small-en-v1.5", temp_dir.path().to_path_buf(), None)
            .unwrap();

        let embedding = model.encode("physics-informed neural networks").unwrap();
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);

        assert!(matches!(model.encode("   "), Err(EncodingError::EmptyInput)));
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = EmbeddingModel::new("nonexistent-model", temp_dir.path().to_path_buf(), None);
        assert!(matches!(result, Err(EncodingError::InvalidModel(_))));
    }

    #[test]
    fn test_canonical_name_folds_aliases() {
        assert_eq!(
            EmbeddingModel::canonical_name("BAAI/bge-small-en-v1.5").unwrap(),
            "bge-small-en-v1.5"
        );
        assert_eq!(
            EmbeddingModel::canonical_name("bgesmallenv15").unwrap(),
            "bge-small-en-v1.5"
        );
        assert!(EmbeddingModel::canonical_name("word2vec").is_err());
    }

    #[test]
    fn test_load_within_timeout_returns_result() {
        let result = run_with_timeout(Duration::from_secs(5), || Ok(384usize));
        assert_eq!(result.unwrap(), 384);

        let result: Result<usize, _> = run_with_timeout(Duration::from_secs(5), || {
            Err(EncodingError::Unavailable("offline".to_string()))
        });
        assert!(matches!(result, Err(EncodingError::Unavailable(_))));
    }

    #[test]
    fn test_slow_load_times_out() {
        let result = run_with_timeout(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_secs(2));
            Ok(384usize)
        });

        match result {
            Err(EncodingError::Unavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_panicking_load_is_unavailable() {
        let result: Result<usize, _> =
            run_with_timeout(Duration::from_secs(5), || panic!("loader crashed"));
        assert!(matches!(result, Err(EncodingError::Unavailable(_))));
    }

    #[test]
    fn test_model_id_hash_is_stable() {
        assert_eq!(model_id_hash("bge-small-en-v1.5"), model_id_hash("bge-small-en-v1.5"));
        assert_ne!(model_id_hash("bge-small-en-v1.5"), model_id_hash("bge-base-en-v1.5"));
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
