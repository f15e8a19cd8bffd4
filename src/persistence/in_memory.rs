//! In-memory document store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{validate_id, DocumentStore, DocumentSummary, FormDocument, PersistenceError};

/// In-memory document store
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<String, FormDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentSummary>, PersistenceError> {
        let documents = self.documents.read().await;
        let mut summaries: Vec<DocumentSummary> = documents.values().map(FormDocument::to_summary).collect();

        // Sort by updated_at descending
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn load(&self, form_id: &str) -> Result<Option<FormDocument>, PersistenceError> {
        let documents = self.documents.read().await;
        Ok(documents.get(form_id).cloned())
    }

    async fn save(&self, document: &FormDocument) -> Result<(), PersistenceError> {
        validate_id(&document.form_id)?;
        let mut documents = self.documents.write().await;
        documents.insert(document.form_id.clone(), document.clone());
        Ok(())
    }

    async fn remove(&self, form_id: &str) -> Result<bool, PersistenceError> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(form_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_remove() {
        let store = InMemoryDocumentStore::new();
        let doc = FormDocument::new("Signup", json!([]));

        store.save(&doc).await.unwrap();
        assert_eq!(store.load(&doc.form_id).await.unwrap(), Some(doc.clone()));

        assert!(store.remove(&doc.form_id).await.unwrap());
        assert!(!store.remove(&doc.form_id).await.unwrap());
        assert!(store.load(&doc.form_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = InMemoryDocumentStore::new();
        let mut older = FormDocument::new("Older", json!([]));
        older.updated_at = older.updated_at - Duration::hours(1);
        let newer = FormDocument::new("Newer", json!([]));

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.form_name).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
    }
}
