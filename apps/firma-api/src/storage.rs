//! Blob storage for stamped PDFs
//!
//! Filesystem-backed: stamped documents land under
//! `{data_dir}/signed/{request_id}.pdf` and are served back through the
//! `/files` route.

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    pub fn new(root: PathBuf, public_base: String) -> Self {
        Self { root, public_base }
    }

    /// Persist `bytes` under `key` and return the public URL.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating blob directory {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing blob {}", path.display()))?;

        Ok(format!("{}/{}", self.public_base, key))
    }
}
