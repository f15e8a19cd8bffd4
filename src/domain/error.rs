//! Error taxonomy for the form engine
//!
//! - `SchemaError`: malformed field tree, fatal at construction
//! - `ValidationError`: per-path, non-fatal, collected into an `ErrorMap`
//! - `DependencyError`: unresolvable dependency or failing option loader, logged
//! - `SubmissionError`: the host submit handler failed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while normalizing a field definition into a `FormTree`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Field at {location} is missing a name")]
    MissingName { location: String },

    #[error("Field at {location} is missing a type")]
    MissingType { location: String },

    #[error("Unknown field type '{field_type}' at {location}")]
    UnknownType { field_type: String, location: String },

    #[error("Field name '{name}' at {location} cannot be used as a path segment")]
    InvalidName { name: String, location: String },

    #[error("Duplicate field name '{name}' in scope '{scope}'")]
    DuplicateName { name: String, scope: String },

    #[error("Invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("Invalid bounds for field '{field}': {reason}")]
    InvalidBounds { field: String, reason: String },

    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Malformed field definition: {0}")]
    Malformed(String),
}

/// Errors raised while reading dependencies or loading dynamic options.
/// These are reported and degrade gracefully; they never abort a form.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Field '{field}' depends on unknown field '{dependency}'")]
    UnknownField { field: String, dependency: String },

    #[error("Option loader for '{field}' failed: {reason}")]
    OptionLoader { field: String, reason: String },
}

/// Errors surfaced to the host when its submit handler fails
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Submit handler failed: {0}")]
    Handler(anyhow::Error),

    #[error("Submit handler panicked")]
    Panicked,
}

/// Errors raised when writing through a path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Cannot write through template path '{0}'")]
    Template(String),

    #[error("Cannot write through path '{0}'")]
    Unwritable(String),
}

// ============================================================================
// Validation Errors
// ============================================================================

/// The rule a validation error came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rule {
    Required,
    MinLength,
    MaxLength,
    Pattern,
    Min,
    Max,
    MinSelected,
    MaxSelected,
    MinRows,
    MaxRows,
    Format,
    Custom,
}

/// A single failed rule for one path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub rule: Rule,
    pub message: String,
}

impl ValidationError {
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// Path-keyed validation failures; empty means the form is valid
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<String, Vec<ValidationError>>);

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of paths with at least one error
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, path: impl Into<String>, error: ValidationError) {
        self.0.entry(path.into()).or_default().push(error);
    }

    /// Record all errors for a path; an empty list records nothing
    pub fn extend_path(&mut self, path: impl Into<String>, errors: Vec<ValidationError>) {
        if !errors.is_empty() {
            self.0.entry(path.into()).or_default().extend(errors);
        }
    }

    pub fn get(&self, path: &str) -> Option<&[ValidationError]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Error messages for a path, in rule order
    pub fn messages(&self, path: &str) -> Vec<String> {
        self.get(path)
            .map(|errors| errors.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationError])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// A new map holding only the paths accepted by `keep`
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> ErrorMap {
        ErrorMap(
            self.0
                .iter()
                .filter(|(path, _)| keep(path.as_str()))
                .map(|(path, errors)| (path.clone(), errors.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_map_collects_per_path() {
        let mut errors = ErrorMap::new();
        errors.insert("password", ValidationError::new(Rule::MinLength, "too short"));
        errors.insert("password", ValidationError::new(Rule::Pattern, "needs a digit"));
        errors.extend_path("email", vec![]);

        assert_eq!(errors.len(), 1);
        assert!(!errors.contains("email"));
        assert_eq!(errors.messages("password"), vec!["too short", "needs a digit"]);
    }

    #[test]
    fn test_error_map_filtered() {
        let mut errors = ErrorMap::new();
        errors.insert("a", ValidationError::new(Rule::Required, "required"));
        errors.insert("b", ValidationError::new(Rule::Required, "required"));

        let only_a = errors.filtered(|p| p == "a");
        assert_eq!(only_a.paths().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
    }
}
