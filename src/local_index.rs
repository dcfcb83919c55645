//! Directory-backed [`IndexService`] for offline use.
//!
//! Each index is a directory under a root; uploading copies the file in
//! under its original name. Handy for running the ingestion pipeline
//! without credentials, and as a stand-in during tests.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::remote::IndexService;

pub struct LocalIndexService {
    root: PathBuf,
}

impl LocalIndexService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the documents of `index_id`.
    pub fn index_dir(&self, index_id: &str) -> PathBuf {
        self.root.join(index_id)
    }
}

impl IndexService for LocalIndexService {
    fn create_index(&self) -> Result<String> {
        let id = format!("local-{}", uuid::Uuid::new_v4().simple());
        let dir = self.index_dir(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create local index at {}", dir.display()))?;
        Ok(id)
    }

    fn upload_document(&self, index_id: &str, path: &Path) -> Result<()> {
        let dir = self.index_dir(index_id);
        if !dir.is_dir() {
            bail!("Local index does not exist: {}", index_id);
        }
        let name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", path.display()))?;
        fs::copy(path, dir.join(name))
            .with_context(|| format!("Failed to copy {} into {}", path.display(), index_id))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}
