use crate::{
    semantic::{EmbeddingModel, DEFAULT_MODEL, DEFAULT_TOP_K},
    storage::DataDir,
};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.yaml";

/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Rows per page when browsing papers and repositories
const DEFAULT_PER_PAGE: usize = 10;

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SemanticSearchConfig {
    /// Model name for embeddings (e.g., "bge-small-en-v1.5").
    /// Must match the model the stored embeddings were produced with.
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Number of results when a search doesn't ask for a specific count
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            default_top_k: DEFAULT_TOP_K,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_semantic_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseConfig {
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let sem = &self.semantic_search;
        if sem.default_top_k == 0 {
            bail!("semantic_search.default_top_k must be greater than 0");
        }
        if sem.download_timeout_secs == 0 {
            bail!("semantic_search.download_timeout_secs must be greater than 0");
        }
        EmbeddingModel::canonical_name(&sem.model)
            .with_context(|| format!("semantic_search.model '{}' is not supported", sem.model))?;

        if self.browse.per_page == 0 {
            bail!("browse.per_page must be greater than 0");
        }

        Ok(())
    }

    /// Load `config.yaml` from the data directory, writing defaults if it doesn't exist.
    pub fn load_with(dir: &DataDir) -> anyhow::Result<Self> {
        if !dir.exists(CONFIG_FILE) {
            dir.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())
                .context("failed to write default config")?;
        }

        let config_str = String::from_utf8(dir.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save(dir)?;
        }

        Ok(config)
    }

    pub fn save(&self, dir: &DataDir) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        dir.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }
}
