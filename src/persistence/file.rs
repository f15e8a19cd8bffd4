//! File-based document store

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{validate_id, DocumentStore, DocumentSummary, FormDocument, PersistenceError};

/// One `<form_id>.json` file per document under a base directory
pub struct FileDocumentStore {
    base_path: PathBuf,
}

impl FileDocumentStore {
    /// Create a new file store
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let base_path = base_path.as_ref().to_path_buf();

        // Sync for constructor
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn document_path(&self, form_id: &str) -> Result<PathBuf, PersistenceError> {
        validate_id(form_id)?;
        Ok(self.base_path.join(format!("{}.json", form_id)))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentSummary>, PersistenceError> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut summaries = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let parsed = match fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<FormDocument>(&content).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(document) => summaries.push(document.to_summary()),
                Err(e) => tracing::warn!("Skipping unreadable form document {}: {}", path.display(), e),
            }
        }

        // Sort by updated_at descending
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn load(&self, form_id: &str) -> Result<Option<FormDocument>, PersistenceError> {
        let path = self.document_path(form_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, document: &FormDocument) -> Result<(), PersistenceError> {
        let path = self.document_path(&document.form_id)?;
        let content = serde_json::to_string_pretty(document)?;
        fs::write(&path, content).await?;
        tracing::debug!("Saved form document {} to {}", document.form_id, path.display());
        Ok(())
    }

    async fn remove(&self, form_id: &str) -> Result<bool, PersistenceError> {
        let path = self.document_path(form_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }
}
