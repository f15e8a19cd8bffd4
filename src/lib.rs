//! # Formloom - schema-driven form engine
//!
//! Formloom turns a declarative field tree into a live form: a reactive value
//! store, cross-field dependency resolution (visibility, disabled state,
//! dynamically fetched options), scheduled validation and a renderer-agnostic
//! adapter contract.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formloom::domain::{FieldDef, FormTree};
//! use formloom::engine::{FormStore, FormSubmit, SetValueOptions, ValidationMode};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tree = FormTree::from_defs(vec![
//!         FieldDef::email("email").required(true),
//!         FieldDef::password("password").required(true).min_length(8),
//!     ])?;
//!
//!     let store = FormStore::builder(tree)
//!         .mode(ValidationMode::OnBlur)
//!         .on_submit(|values| async move {
//!             println!("submitted {}", values);
//!             Ok(())
//!         })
//!         .build();
//!
//!     store.set_value("email", json!("ada@example.com"), SetValueOptions::default())?;
//!     store.handle_submit(&mut FormSubmit::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: field tree model, paths, declarative conditions, errors
//! - **Engine**: dependency engine, validation engine, form state store
//! - **Adapters**: adapter and renderer contracts
//! - **Persistence**: saved form documents
//! - **Config**: settings for the CLI

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod persistence;

use thiserror::Error;

use crate::config::SettingsError;
use crate::domain::error::{DependencyError, PathError, SchemaError, SubmissionError};
use crate::persistence::PersistenceError;

/// Any error the crate surfaces to a host
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type FormResult<T> = Result<T, FormError>;
