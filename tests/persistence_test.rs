use chrono::Duration;
use formloom::config::{StorageBackend, StorageSettings};
use formloom::persistence::{self, DocumentStore, FileDocumentStore, FormDocument, PersistenceError};
use serde_json::json;
use tempfile::TempDir;

fn signup_fields() -> serde_json::Value {
    json!({
        "fields": [
            { "type": "email", "name": "email", "required": true },
            { "type": "password", "name": "password", "minLength": 8 }
        ]
    })
}

#[tokio::test]
async fn test_file_store_round_trip() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileDocumentStore::new(temp_dir.path().join("forms"))?;

    let doc = FormDocument::new("Signup", signup_fields());
    store.save(&doc).await?;

    let file = store.base_path().join(format!("{}.json", doc.form_id));
    let on_disk: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    assert_eq!(on_disk["formName"], "Signup");

    let loaded = store.load(&doc.form_id).await?.expect("document was saved");
    assert_eq!(loaded, doc);
    assert_eq!(loaded.tree()?.template_paths().len(), 2);

    assert!(store.remove(&doc.form_id).await?);
    assert!(store.load(&doc.form_id).await?.is_none());
    assert!(!store.remove(&doc.form_id).await?);
    Ok(())
}

#[tokio::test]
async fn test_file_store_lists_newest_first_and_skips_junk() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileDocumentStore::new(temp_dir.path())?;

    let mut older = FormDocument::new("Older", json!([]));
    older.updated_at = older.updated_at - Duration::days(1);
    let newer = FormDocument::new("Newer", json!([]));
    store.save(&older).await?;
    store.save(&newer).await?;

    std::fs::write(temp_dir.path().join("broken.json"), "{ not json")?;
    std::fs::write(temp_dir.path().join("notes.txt"), "ignored")?;

    let names: Vec<String> = store.list().await?.into_iter().map(|s| s.form_name).collect();
    assert_eq!(names, vec!["Newer", "Older"]);
    Ok(())
}

#[tokio::test]
async fn test_file_store_rejects_path_like_ids() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileDocumentStore::new(temp_dir.path())?;

    let doc = FormDocument {
        form_id: "../escape".to_string(),
        ..FormDocument::new("Escape", json!([]))
    };
    assert!(matches!(store.save(&doc).await, Err(PersistenceError::InvalidId(_))));
    assert!(matches!(store.load("a/b").await, Err(PersistenceError::InvalidId(_))));
    Ok(())
}

#[tokio::test]
async fn test_create_store_from_settings() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = StorageSettings {
        backend: StorageBackend::File,
        path: temp_dir.path().join("docs"),
    };
    let store = persistence::create_store(&settings)?;

    let doc = FormDocument::new("Survey", signup_fields());
    store.save(&doc).await?;
    assert_eq!(store.list().await?.len(), 1);
    assert!(temp_dir.path().join("docs").is_dir());

    let memory = persistence::create_store(&StorageSettings::default())?;
    assert!(memory.list().await?.is_empty());
    Ok(())
}
