//! File storage for checklist document uploads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::instrument;
use uuid::Uuid;

/// Location of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<StoredFile>;
}

/// Writes uploads to a local directory served under a public base URL.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload dir {}", self.root.display()))?;

        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.root.join(&stored_name);

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Stored upload");

        Ok(StoredFile {
            url: format!("{}/{}", self.public_base_url, stored_name),
        })
    }
}

/// Keep only characters that are safe in a path segment.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
