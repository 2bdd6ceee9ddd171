//! Exact brute-force similarity ranking over stored paper embeddings.
//!
//! Every call re-reads and re-decodes the embedded papers from the store and
//! scores all of them against the query; nothing is cached between calls.
//!
//! Ordering is total: score descending, then paper id ascending, so equal
//! scores always come back in the same order for the same store contents.

use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::{EmbeddedPaper, RecordStore, StoreError};
use crate::semantic::codec::{decode_embedding, BlobError};
use crate::semantic::embeddings::EncodingError;

/// Errors that abort a search request. No partial result accompanies them.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("dimension mismatch: query has {query} dimensions, paper {id} has {stored}")]
    DimensionMismatch { query: usize, stored: usize, id: u64 },

    #[error("model mismatch: paper {id} was embedded with a different model")]
    ModelMismatch { id: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A ranked paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub id: u64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Papers whose blob could not be decoded and were left out
    pub skipped: usize,
}

enum Scored {
    Hit(SearchHit),
    Skipped,
}

/// Brute-force ranker reading embeddings from a [`RecordStore`].
pub struct SimilarityRanker<'a> {
    store: &'a dyn RecordStore,
    expected_model: Option<[u8; 32]>,
}

impl<'a> SimilarityRanker<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            expected_model: None,
        }
    }

    /// Reject blobs produced by any model other than `model_id`.
    pub fn with_model(mut self, model_id: [u8; 32]) -> Self {
        self.expected_model = Some(model_id);
        self
    }

    /// Return up to `top_k` papers ordered by dot-product similarity to `query`.
    ///
    /// Corrupt blobs are skipped and counted. A readable blob with a different
    /// dimension or model than the query fails the whole request.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<SearchResults, SearchError> {
        if top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if let Some(idx) = query.iter().position(|x| !x.is_finite()) {
            return Err(SearchError::InvalidArgument(format!(
                "query component {idx} is not a finite number"
            )));
        }

        let candidates = self.store.records_with_embedding()?;

        let outcomes: Vec<Result<Scored, SearchError>> = candidates
            .par_iter()
            .map(|paper| self.score(query, paper))
            .collect();

        let mut hits = Vec::with_capacity(outcomes.len());
        let mut skipped = 0;
        for outcome in outcomes {
            match outcome? {
                Scored::Hit(hit) => hits.push(hit),
                Scored::Skipped => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("skipped {skipped} papers with unreadable embeddings");
        }

        rank(&mut hits);
        hits.truncate(top_k);

        log::debug!(
            "scored {} of {} embedded papers, returning {}",
            candidates.len() - skipped,
            candidates.len(),
            hits.len()
        );

        Ok(SearchResults { hits, skipped })
    }

    fn score(&self, query: &[f32], paper: &EmbeddedPaper) -> Result<Scored, SearchError> {
        let decoded = match decode_embedding(&paper.blob) {
            Ok(decoded) => decoded,
            Err(err) => {
                log_decode_failure(paper.id, &err);
                return Ok(Scored::Skipped);
            }
        };

        if decoded.dimensions() != query.len() {
            return Err(SearchError::DimensionMismatch {
                query: query.len(),
                stored: decoded.dimensions(),
                id: paper.id,
            });
        }

        if let Some(expected) = &self.expected_model {
            if decoded.model_id != *expected {
                return Err(SearchError::ModelMismatch { id: paper.id });
            }
        }

        if let Err(err) = decoded.check_unit_norm() {
            log_decode_failure(paper.id, &err);
            return Ok(Scored::Skipped);
        }

        Ok(Scored::Hit(SearchHit {
            // + 0.0 folds -0.0 into 0.0 so zero scores tie on id
            score: dot_product(query, &decoded.vector) + 0.0,
            id: paper.id,
            title: paper.title.clone(),
            abstract_text: paper.abstract_text.clone(),
        }))
    }
}

fn log_decode_failure(id: u64, err: &BlobError) {
    log::warn!("paper {id}: skipping unreadable embedding: {err}");
}

/// Dot product; equals cosine similarity for unit-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Sort by score descending, ties by id ascending.
fn rank(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}
