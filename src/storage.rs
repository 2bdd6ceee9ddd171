use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use homedir::my_home;

/// Environment variable overriding the data directory
pub const BASE_PATH_ENV: &str = "REFSHELF_BASE_PATH";

/// The directory holding the catalog, config and model cache.
#[derive(Debug, Clone)]
pub struct DataDir {
    pub base_dir: PathBuf,
}

impl DataDir {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(DataDir { base_dir })
    }

    /// `$REFSHELF_BASE_PATH`, falling back to `~/.local/share/refshelf`.
    pub fn resolve() -> anyhow::Result<Self> {
        let base_dir = match std::env::var(BASE_PATH_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let home = my_home()
                    .context("Could not determine home directory")?
                    .context("Home directory path is empty")?;
                home.join(".local/share/refshelf")
            }
        };

        Self::new(&base_dir).with_context(|| {
            format!("Failed to create data directory {}", base_dir.display())
        })
    }

    pub fn path(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }

    pub fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path(ident)).is_ok()
    }

    pub fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(ident))
    }

    /// Write through a temp file in the same directory, then rename over `ident`.
    pub fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&self.base_dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(self.path(ident)).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn as_path(&self) -> &Path {
        &self.base_dir
    }
}
