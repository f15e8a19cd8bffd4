//! Form document persistence
//!
//! A form document wraps a serialized field tree with identity and
//! timestamps. Storage backends:
//! - In-memory (default, lost on restart)
//! - File-based (one pretty-printed JSON file per document)

mod error;
mod file;
mod in_memory;

pub use error::PersistenceError;
pub use file::FileDocumentStore;
pub use in_memory::InMemoryDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageSettings};
use crate::domain::tree::FormTree;

/// Schema version written into new documents
pub const SCHEMA_VERSION: &str = "1.0";

/// A saved form definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    pub form_id: String,
    pub form_name: String,
    pub schema_version: String,
    pub builder_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Serialized field tree (a definition list or `{ "fields": [...] }`)
    pub fields: Value,
}

impl FormDocument {
    /// Create a document with a fresh id
    pub fn new(form_name: impl Into<String>, fields: Value) -> Self {
        let now = Utc::now();
        Self {
            form_id: uuid::Uuid::new_v4().to_string(),
            form_name: form_name.into(),
            schema_version: SCHEMA_VERSION.to_string(),
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Normalize the stored fields into a field tree
    pub fn tree(&self) -> Result<FormTree, PersistenceError> {
        Ok(FormTree::from_value(self.fields.clone())?)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_summary(&self) -> DocumentSummary {
        DocumentSummary {
            form_id: self.form_id.clone(),
            form_name: self.form_name.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a saved document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub form_id: String,
    pub form_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Trait for form document storage backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Summaries of every stored document, most recently updated first
    async fn list(&self) -> Result<Vec<DocumentSummary>, PersistenceError>;

    /// Load a document by id
    async fn load(&self, form_id: &str) -> Result<Option<FormDocument>, PersistenceError>;

    /// Insert or replace a document
    async fn save(&self, document: &FormDocument) -> Result<(), PersistenceError>;

    /// Remove a document; returns whether it existed
    async fn remove(&self, form_id: &str) -> Result<bool, PersistenceError>;
}

/// Ids are used as file names
pub fn validate_id(form_id: &str) -> Result<(), PersistenceError> {
    let valid = !form_id.is_empty()
        && form_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidId(form_id.to_string()))
    }
}

/// Create a document store from configuration
pub fn create_store(settings: &StorageSettings) -> Result<Arc<dyn DocumentStore>, PersistenceError> {
    match settings.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
        StorageBackend::File => Ok(Arc::new(FileDocumentStore::new(&settings.path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = FormDocument::new("Signup", json!([{ "type": "email", "name": "email" }]));
        let value = serde_json::to_value(&doc).unwrap();

        assert!(value.get("formId").is_some());
        assert_eq!(value["formName"], "Signup");
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
        assert!(value.get("updatedAt").is_some());
        assert_eq!(doc.tree().unwrap().template_paths().len(), 1);
    }

    #[test]
    fn test_invalid_stored_tree_surfaces_schema_error() {
        let doc = FormDocument::new("Broken", json!([{ "type": "text" }]));
        assert!(matches!(doc.tree(), Err(PersistenceError::Schema(_))));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("signup_form-2").is_ok());
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("").is_err());
    }
}
