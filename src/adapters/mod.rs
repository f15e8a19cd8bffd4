//! Adapter contract between the engine and a state-management binding, and
//! the renderer contract built on top of it

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::error::{PathError, SubmissionError};
use crate::engine::dependency::FieldState;
use crate::engine::store::{FormState, FormStore, SetValueOptions, SubmitEvent, SubmitOutcome};

pub mod render;

#[cfg(test)]
mod render_test;

pub use render::{render_form, FieldRenderer, FieldView, OutlineRenderer};

/// What a renderer needs from the form's state owner
#[async_trait]
pub trait FormAdapter: Send + Sync {
    /// Current value at `path` (null when absent)
    fn watch(&self, path: &str) -> Value;

    fn set_value(&self, path: &str, value: Value, options: SetValueOptions) -> Result<(), PathError>;

    fn get_values(&self) -> Arc<Value>;

    fn form_state(&self) -> FormState;

    /// Error messages currently shown for `path`
    fn errors_for(&self, path: &str) -> Vec<String>;

    /// Computed hidden/disabled/read-only/options state of one field
    fn field_state(&self, path: &str) -> Option<FieldState>;

    fn on_blur(&self, path: &str);

    fn reset(&self, values: Option<Value>);

    async fn handle_submit(&self, event: &mut dyn SubmitEvent) -> Result<SubmitOutcome, SubmissionError>;
}

#[async_trait]
impl FormAdapter for FormStore {
    fn watch(&self, path: &str) -> Value {
        FormStore::watch(self, path)
    }

    fn set_value(&self, path: &str, value: Value, options: SetValueOptions) -> Result<(), PathError> {
        FormStore::set_value(self, path, value, options)
    }

    fn get_values(&self) -> Arc<Value> {
        FormStore::get_values(self)
    }

    fn form_state(&self) -> FormState {
        FormStore::form_state(self)
    }

    fn errors_for(&self, path: &str) -> Vec<String> {
        FormStore::errors_for(self, path)
    }

    fn field_state(&self, path: &str) -> Option<FieldState> {
        FormStore::field_state(self, path)
    }

    fn on_blur(&self, path: &str) {
        FormStore::on_blur(self, path)
    }

    fn reset(&self, values: Option<Value>) {
        FormStore::reset(self, values)
    }

    async fn handle_submit(&self, event: &mut dyn SubmitEvent) -> Result<SubmitOutcome, SubmissionError> {
        FormStore::handle_submit(self, event).await
    }
}
