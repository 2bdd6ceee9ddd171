//! Embeds papers that were ingested without an embedding.

use serde::Serialize;

use crate::catalog::{CatalogCsv, PaperRecord, RecordStore, StoreError};
use crate::semantic::{encode_embedding, BlobError, Encoder, EncodingError};

/// Papers sent to the encoder per batch
const BATCH_SIZE: usize = 32;

/// Longest encoder input, in characters. Abstracts past this are cut.
const MAX_INPUT_CHARS: usize = 512;

#[derive(thiserror::Error, Debug)]
pub enum BackfillError {
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub already_embedded: usize,
    /// Papers with neither title nor abstract
    pub skipped_empty: usize,
}

/// The text a paper is embedded from: `"<title> - <abstract>"`, or whichever of
/// the two is present. `None` when both are blank.
///
/// Queries are matched against this text, so it must stay in step with how the
/// ingestion process embedded the existing catalog.
fn embedding_input(paper: &PaperRecord) -> Option<String> {
    let parts: Vec<&str> = [paper.title.trim(), paper.abstract_text.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let text = parts.join(" - ");
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some(_) => {
            let cut: String = text.chars().take(MAX_INPUT_CHARS - 3).collect();
            Some(cut + "...")
        }
        None => Some(text),
    }
}

/// Embed every paper lacking an embedding (every paper with `force`) and save the catalog.
///
/// Nothing is written unless all batches succeed.
pub fn backfill(
    catalog: &mut CatalogCsv,
    encoder: &dyn Encoder,
    force: bool,
) -> Result<BackfillReport, BackfillError> {
    let mut report = BackfillReport::default();
    let mut pending = vec![];

    for paper in catalog.papers()? {
        if paper.has_embedding() && !force {
            report.already_embedded += 1;
            continue;
        }
        match embedding_input(&paper) {
            Some(content) => pending.push((paper.id, content)),
            None => {
                log::warn!("paper {}: no title or abstract, not embedding", paper.id);
                report.skipped_empty += 1;
            }
        }
    }

    if pending.is_empty() {
        log::info!("all papers already embedded");
        return Ok(report);
    }

    let model_id = encoder.model_id();
    let mut blobs = Vec::with_capacity(pending.len());
    for batch in pending.chunks(BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let embeddings = encoder.encode_batch(&texts)?;
        if embeddings.len() != batch.len() {
            return Err(EncodingError::Failed(format!(
                "expected {} embeddings, model returned {}",
                batch.len(),
                embeddings.len()
            ))
            .into());
        }

        for ((id, _), embedding) in batch.iter().zip(embeddings) {
            blobs.push((*id, encode_embedding(&model_id, &embedding)?));
        }
        log::info!("embedded {}/{} papers", blobs.len(), pending.len());
    }

    for (id, blob) in blobs {
        catalog.set_embedding(id, blob)?;
        report.embedded += 1;
    }
    catalog.save_papers()?;

    log::info!(
        "wrote {} embeddings to {}",
        report.embedded,
        catalog.papers_path().display()
    );

    Ok(report)
}
