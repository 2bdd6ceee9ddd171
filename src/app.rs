use crate::{
    backfill::{self, BackfillReport},
    browse::{self, Page, Paged, PaperFilter, RepoFilter},
    catalog::{CatalogCsv, PaperRecord, RecordStore, RepoRecord},
    config::Config,
    dashboard::{self, DashboardStats},
    semantic::{Encoder, LazyEncoder, SearchResults, SemanticSearchService},
    storage::DataDir,
};
use anyhow::Context;

/// Everything a command needs: configuration, the loaded catalog and the encoder.
pub struct App {
    pub config: Config,
    catalog: CatalogCsv,
    encoder: Box<dyn Encoder>,
}

impl App {
    pub fn open(data_dir: DataDir) -> anyhow::Result<Self> {
        let config = Config::load_with(&data_dir)?;
        let catalog = CatalogCsv::load(data_dir.as_path()).with_context(|| {
            format!("Failed to load catalog from {}", data_dir.as_path().display())
        })?;
        let encoder = LazyEncoder::new(
            config.semantic_search.clone(),
            data_dir.as_path().to_path_buf(),
        )?;

        Ok(Self::new(config, catalog, Box::new(encoder)))
    }

    pub fn new(config: Config, catalog: CatalogCsv, encoder: Box<dyn Encoder>) -> Self {
        App {
            config,
            catalog,
            encoder,
        }
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> anyhow::Result<SearchResults> {
        let top_k = top_k.unwrap_or(self.config.semantic_search.default_top_k);
        let service = SemanticSearchService::new(&self.catalog, self.encoder.as_ref());
        Ok(service.search(query, top_k)?)
    }

    fn page(&self, number: usize, per_page: Option<usize>) -> Page {
        Page {
            number,
            per_page: per_page.unwrap_or(self.config.browse.per_page),
        }
    }

    pub fn papers(
        &self,
        filter: &PaperFilter,
        page: usize,
        per_page: Option<usize>,
    ) -> anyhow::Result<Paged<PaperRecord>> {
        Ok(browse::browse_papers(
            &self.catalog,
            filter,
            self.page(page, per_page),
        )?)
    }

    pub fn repos(
        &self,
        filter: &RepoFilter,
        page: usize,
        per_page: Option<usize>,
    ) -> anyhow::Result<Paged<RepoRecord>> {
        Ok(browse::browse_repos(
            &self.catalog,
            filter,
            self.page(page, per_page),
        )?)
    }

    pub fn paper(&self, id: u64) -> anyhow::Result<PaperRecord> {
        Ok(self.catalog.paper_by_id(id)?)
    }

    pub fn repo(&self, id: u64) -> anyhow::Result<RepoRecord> {
        Ok(self.catalog.repo_by_id(id)?)
    }

    pub fn dashboard(&self) -> anyhow::Result<DashboardStats> {
        Ok(dashboard::dashboard(&self.catalog)?)
    }

    pub fn backfill(&mut self, force: bool) -> anyhow::Result<BackfillReport> {
        Ok(backfill::backfill(&mut self.catalog, self.encoder.as_ref(), force)?)
    }
}
