
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::catalog::{
    join_authors, EmbeddedPaper, PaperRecord, RecordStore, RepoRecord, StoreError,
};
use crate::semantic::{encode_embedding, model_id_hash, Encoder, EncodingError};

pub const TEST_MODEL: &str = "bge-small-en-v1.5";

pub fn test_model_id() -> [u8; 32] {
    model_id_hash(TEST_MODEL)
}

pub fn blob(embedding: &[f32]) -> Vec<u8> {
    encode_embedding(&test_model_id(), embedding).unwrap()
}

pub fn paper(id: u64, title: &str, embedding: Option<&[f32]>) -> PaperRecord {
    PaperRecord {
        id,
        title: title.to_string(),
        abstract_text: format!("Abstract of {title}"),
        authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
        publication_date: "2024-01-15".to_string(),
        area: "Machine Learning".to_string(),
        subarea: "PINN".to_string(),
        url: format!("https://arxiv.org/abs/{id}"),
        embedding: embedding.map(blob),
    }
}

/// In-memory store that counts how often embeddings are fetched.
#[derive(Default)]
pub struct MemoryStore {
    pub papers: Vec<PaperRecord>,
    pub repos: Vec<RepoRecord>,
    pub fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn with_papers(papers: Vec<PaperRecord>) -> Self {
        Self {
            papers,
            ..Default::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryStore {
    fn records_with_embedding(&self) -> Result<Vec<EmbeddedPaper>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .papers
            .iter()
            .filter_map(|p| {
                p.embedding.as_ref().map(|blob| EmbeddedPaper {
                    id: p.id,
                    title: p.title.clone(),
                    abstract_text: p.abstract_text.clone(),
                    blob: blob.clone(),
                })
            })
            .collect())
    }

    fn paper_by_id(&self, id: u64) -> Result<PaperRecord, StoreError> {
        self.papers
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "paper", id })
    }

    fn repo_by_id(&self, id: u64) -> Result<RepoRecord, StoreError> {
        self.repos
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound { kind: "repo", id })
    }

    fn papers(&self) -> Result<Vec<PaperRecord>, StoreError> {
        Ok(self.papers.clone())
    }

    fn repos(&self) -> Result<Vec<RepoRecord>, StoreError> {
        Ok(self.repos.clone())
    }
}

/// Encoder returning canned vectors; unknown text fails as if the model were down.
pub struct FixedEncoder {
    pub vectors: HashMap<String, Vec<f32>>,
    pub model_id: [u8; 32],
    pub calls: AtomicUsize,
}

impl FixedEncoder {
    pub fn new(entries: &[(&str, &[f32])]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
            model_id: test_model_id(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Encoder for FixedEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(EncodingError::EmptyInput);
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EncodingError::Unavailable(format!("no vector for {text:?}")))
    }

    fn model_id(&self) -> [u8; 32] {
        self.model_id
    }
}

/// Write `papers.csv` the way the ingestion process lays it out.
pub fn write_papers_csv(dir: &Path, papers: &[PaperRecord]) {
    let mut wrt = csv::Writer::from_path(dir.join(crate::catalog::PAPERS_FILE)).unwrap();
    wrt.write_record([
        "id",
        "title",
        "abstract",
        "authors",
        "publication_date",
        "area",
        "subarea",
        "url",
        "embedding",
    ])
    .unwrap();
    for p in papers {
        let embedding = p
            .embedding
            .as_ref()
            .map(|b| STANDARD.encode(b))
            .unwrap_or_default();
        wrt.write_record([
            &p.id.to_string(),
            &p.title,
            &p.abstract_text,
            &join_authors(&p.authors),
            &p.publication_date,
            &p.area,
            &p.subarea,
            &p.url,
            &embedding,
        ])
        .unwrap();
    }
    wrt.flush().unwrap();
}

pub fn write_repos_csv(dir: &Path, repos: &[RepoRecord]) {
    let mut wrt = csv::Writer::from_path(dir.join(crate::catalog::REPOS_FILE)).unwrap();
    wrt.write_record(["id", "name", "author", "url", "area", "subarea", "readme"])
        .unwrap();
    for r in repos {
        wrt.write_record([
            &r.id.to_string(),
            &r.name,
            &r.author,
            &r.url,
            &r.area,
            &r.subarea,
            &r.readme.clone().unwrap_or_default(),
        ])
        .unwrap();
    }
    wrt.flush().unwrap();
}

pub fn repo(id: u64, name: &str, author: &str, area: &str) -> RepoRecord {
    RepoRecord {
        id,
        name: name.to_string(),
        author: author.to_string(),
        url: format!("https://github.com/{author}/{name}"),
        area: area.to_string(),
        subarea: String::new(),
        readme: None,
    }
}
