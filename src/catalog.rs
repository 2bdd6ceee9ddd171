use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Debug, Clone, Eq, Default, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: u64,

    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub publication_date: String,
    pub area: String,
    pub subarea: String,
    pub url: String,

    /// Serialized embedding, see `semantic::codec`
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
}

impl PaperRecord {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

impl PartialEq for PaperRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Eq, Default, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: u64,

    pub name: String,
    pub author: String,
    pub url: String,
    pub area: String,
    pub subarea: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

impl PartialEq for RepoRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The slice of a paper the ranker needs: identity, display fields and the raw blob.
#[derive(Debug, Clone)]
pub struct EmbeddedPaper {
    pub id: u64,
    pub title: String,
    pub abstract_text: String,
    pub blob: Vec<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("duplicate {kind} id {id} in {path}")]
    DuplicateId {
        kind: &'static str,
        id: u64,
        path: String,
    },

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record: {0}")]
    Malformed(#[from] anyhow::Error),
}

/// Read access to the paper and repository collections.
pub trait RecordStore: Send + Sync {
    /// Every paper that carries an embedding blob, in store order.
    fn records_with_embedding(&self) -> Result<Vec<EmbeddedPaper>, StoreError>;
    fn paper_by_id(&self, id: u64) -> Result<PaperRecord, StoreError>;
    fn repo_by_id(&self, id: u64) -> Result<RepoRecord, StoreError>;
    fn papers(&self) -> Result<Vec<PaperRecord>, StoreError>;
    fn repos(&self) -> Result<Vec<RepoRecord>, StoreError>;
}

const PAPER_HEADERS: [&str; 9] = [
    "id",
    "title",
    "abstract",
    "authors",
    "publication_date",
    "area",
    "subarea",
    "url",
    "embedding",
];

const REPO_HEADERS: [&str; 7] = ["id", "name", "author", "url", "area", "subarea", "readme"];

pub const PAPERS_FILE: &str = "papers.csv";
pub const REPOS_FILE: &str = "repos.csv";

/// Split the comma-joined author column into names.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

pub fn join_authors(authors: &[String]) -> String {
    authors.join(", ")
}

/// CSV-backed catalog holding `papers.csv` and `repos.csv`.
#[derive(Debug, Clone, Default)]
pub struct CatalogCsv {
    papers: Vec<PaperRecord>,
    repos: Vec<RepoRecord>,
    paper_index: HashMap<u64, usize>,
    repo_index: HashMap<u64, usize>,
    papers_path: PathBuf,
}

fn ensure_csv(path: &Path, headers: &[&str]) -> Result<(), StoreError> {
    if let Err(err) = std::fs::metadata(path) {
        match err.kind() {
            ErrorKind::NotFound => {
                log::info!("Creating new catalog file at {}", path.display());
                let mut csv_wrt = csv::Writer::from_path(path)?;
                csv_wrt.write_record(headers)?;
                csv_wrt.flush()?;
            }
            _ => Err(err)?,
        }
    }
    Ok(())
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, StoreError> {
    record
        .get(idx)
        .ok_or_else(|| StoreError::Malformed(anyhow!("couldnt get record {name}")))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn index_by_id<T>(
    items: &[T],
    id_of: impl Fn(&T) -> u64,
    kind: &'static str,
    path: &Path,
) -> Result<HashMap<u64, usize>, StoreError> {
    let mut index = HashMap::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let id = id_of(item);
        if index.insert(id, pos).is_some() {
            return Err(StoreError::DuplicateId {
                kind,
                id,
                path: path.display().to_string(),
            });
        }
    }
    Ok(index)
}

impl CatalogCsv {
    /// Load both collections from `base_dir`, creating empty files when missing.
    pub fn load(base_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(base_dir)?;
        let papers_path = base_dir.join(PAPERS_FILE);
        let repos_path = base_dir.join(REPOS_FILE);

        ensure_csv(&papers_path, &PAPER_HEADERS)?;
        ensure_csv(&repos_path, &REPO_HEADERS)?;

        let now = Instant::now();
        let papers = Self::read_papers(&papers_path)?;
        let repos = Self::read_repos(&repos_path)?;

        log::debug!(
            "took {}ms to read {} papers and {} repos",
            now.elapsed().as_micros() as f64 / 1000.0,
            papers.len(),
            repos.len()
        );

        let paper_index = index_by_id(&papers, |p| p.id, "paper", &papers_path)?;
        let repo_index = index_by_id(&repos, |r| r.id, "repo", &repos_path)?;

        Ok(CatalogCsv {
            papers,
            repos,
            paper_index,
            repo_index,
            papers_path,
        })
    }

    fn read_papers(path: &Path) -> Result<Vec<PaperRecord>, StoreError> {
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut papers = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let id = field(&record, 0, "id")?
                .parse::<u64>()
                .map_err(|e| StoreError::Malformed(anyhow!("invalid paper id: {e}")))?;

            let embedding = field(&record, 8, "embedding")?;
            let embedding = if embedding.is_empty() {
                None
            } else {
                match STANDARD.decode(embedding) {
                    Ok(blob) => Some(blob),
                    Err(err) => {
                        // kept as-is so the ranker reports it as a corrupt blob
                        log::warn!("paper {id}: embedding column is not valid base64: {err}");
                        Some(embedding.as_bytes().to_vec())
                    }
                }
            };

            papers.push(PaperRecord {
                id,
                title: field(&record, 1, "title")?.to_string(),
                abstract_text: field(&record, 2, "abstract")?.to_string(),
                authors: split_authors(field(&record, 3, "authors")?),
                publication_date: field(&record, 4, "publication_date")?.to_string(),
                area: field(&record, 5, "area")?.to_string(),
                subarea: field(&record, 6, "subarea")?.to_string(),
                url: field(&record, 7, "url")?.to_string(),
                embedding,
            });
        }

        Ok(papers)
    }

    fn read_repos(path: &Path) -> Result<Vec<RepoRecord>, StoreError> {
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut repos = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let id = field(&record, 0, "id")?
                .parse::<u64>()
                .map_err(|e| StoreError::Malformed(anyhow!("invalid repo id: {e}")))?;

            repos.push(RepoRecord {
                id,
                name: field(&record, 1, "name")?.to_string(),
                author: field(&record, 2, "author")?.to_string(),
                url: field(&record, 3, "url")?.to_string(),
                area: field(&record, 4, "area")?.to_string(),
                subarea: field(&record, 5, "subarea")?.to_string(),
                readme: non_empty(field(&record, 6, "readme")?),
            });
        }

        Ok(repos)
    }

    /// Replace the embedding blob of a paper in memory. Call `save_papers` to persist.
    pub fn set_embedding(&mut self, id: u64, blob: Vec<u8>) -> Result<(), StoreError> {
        let pos = *self
            .paper_index
            .get(&id)
            .ok_or(StoreError::NotFound { kind: "paper", id })?;
        self.papers[pos].embedding = Some(blob);
        Ok(())
    }

    /// Write `papers.csv` atomically: temp file in the same directory, then rename.
    pub fn save_papers(&self) -> Result<(), StoreError> {
        let dir = self
            .papers_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let temp = tempfile::NamedTempFile::new_in(&dir)?;

        {
            let mut csv_wrt = csv::Writer::from_writer(temp.as_file());
            csv_wrt.write_record(PAPER_HEADERS)?;
            for paper in self.papers.iter() {
                let embedding = paper
                    .embedding
                    .as_ref()
                    .map(|blob| STANDARD.encode(blob))
                    .unwrap_or_default();
                let id = paper.id.to_string();
                csv_wrt.write_record([
                    &id,
                    &paper.title,
                    &paper.abstract_text,
                    &join_authors(&paper.authors),
                    &paper.publication_date,
                    &paper.area,
                    &paper.subarea,
                    &paper.url,
                    &embedding,
                ])?;
            }
            csv_wrt.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.papers_path).map_err(|e| e.error)?;

        Ok(())
    }

    pub fn papers_path(&self) -> &Path {
        &self.papers_path
    }
}

impl RecordStore for CatalogCsv {
    fn records_with_embedding(&self) -> Result<Vec<EmbeddedPaper>, StoreError> {
        Ok(self
            .papers
            .iter()
            .filter_map(|paper| {
                paper.embedding.as_ref().map(|blob| EmbeddedPaper {
                    id: paper.id,
                    title: paper.title.clone(),
                    abstract_text: paper.abstract_text.clone(),
                    blob: blob.clone(),
                })
            })
            .collect())
    }

    fn paper_by_id(&self, id: u64) -> Result<PaperRecord, StoreError> {
        self.paper_index
            .get(&id)
            .map(|&pos| self.papers[pos].clone())
            .ok_or(StoreError::NotFound { kind: "paper", id })
    }

    fn repo_by_id(&self, id: u64) -> Result<RepoRecord, StoreError> {
        self.repo_index
            .get(&id)
            .map(|&pos| self.repos[pos].clone())
            .ok_or(StoreError::NotFound { kind: "repo", id })
    }

    fn papers(&self) -> Result<Vec<PaperRecord>, StoreError> {
        Ok(self.papers.clone())
    }

    fn repos(&self) -> Result<Vec<RepoRecord>, StoreError> {
        Ok(self.repos.clone())
    }
}
