//! Validation Engine
//!
//! Produces the full Error Map for a values snapshot. Built-in rules run
//! first; custom validators run afterwards and are awaited before a field's
//! errors are final. Fields are validated concurrently.

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::dependency::DerivedState;
use super::rules;
use crate::domain::error::{ErrorMap, Rule, ValidationError};
use crate::domain::field::{ArrayContainer, FieldNode, LeafField, ValidationContext, Verdict};
use crate::domain::path::{self, FieldPath};
use crate::domain::tree::{FormTree, TreeVisitor};

/// The pluggable validation resolver
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Validate every visible field of `values`; hidden paths per `derived`
    /// are skipped
    async fn resolve(&self, values: Arc<Value>, derived: Arc<DerivedState>) -> ErrorMap;
}

/// Schema-derived resolver built from a field tree
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    tree: Arc<FormTree>,
}

impl ValidationEngine {
    pub fn new(tree: Arc<FormTree>) -> Self {
        Self { tree }
    }

    /// Validate a snapshot
    pub async fn validate(&self, values: Arc<Value>, derived: &DerivedState) -> ErrorMap {
        let mut plan = Plan {
            derived,
            values: &*values,
            checks: Vec::new(),
        };
        self.tree.walk(&values, &mut plan);
        let checks = plan.checks;

        let results = join_all(checks.into_iter().map(|check| {
            let values = Arc::clone(&values);
            async move {
                match check {
                    Check::Leaf(path, leaf) => {
                        let errors = validate_leaf(leaf, &path, values).await;
                        (path, errors)
                    }
                    Check::Rows(path, array) => {
                        let errors = rules::check_rows(array, path::get(&values, &path));
                        (path, errors)
                    }
                }
            }
        }))
        .await;

        let mut errors = ErrorMap::new();
        for (path, field_errors) in results {
            errors.extend_path(path.to_string(), field_errors);
        }
        tracing::debug!("Validation pass produced {} error paths", errors.len());
        errors
    }
}

#[async_trait]
impl Resolver for ValidationEngine {
    async fn resolve(&self, values: Arc<Value>, derived: Arc<DerivedState>) -> ErrorMap {
        self.validate(values, &derived).await
    }
}

/// Built-in rules, then each custom validator in declaration order
async fn validate_leaf(leaf: &LeafField, path: &FieldPath, values: Arc<Value>) -> Vec<ValidationError> {
    let value = path::get(&values, path).cloned().unwrap_or(Value::Null);
    let mut errors = rules::check_leaf(leaf, &value);

    let required_failed = errors.iter().any(|e| e.rule == Rule::Required);
    if required_failed || leaf.validators.is_empty() {
        return errors;
    }

    let ctx = ValidationContext {
        sibling_data: path::sibling_data(&values, path).clone(),
        data: Arc::clone(&values),
        path: path.to_string(),
        kind: leaf.kind,
    };

    for validator in &leaf.validators {
        let outcome = AssertUnwindSafe(async { validator.call(value.clone(), ctx.clone()).await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(Verdict::Valid)) => {}
            Ok(Ok(Verdict::Invalid(message))) => errors.push(ValidationError::new(Rule::Custom, message)),
            Ok(Err(e)) => {
                tracing::warn!("Custom validator for '{}' failed: {}", path, e);
                errors.push(ValidationError::new(Rule::Custom, "Validation failed"));
            }
            Err(_) => {
                tracing::warn!("Custom validator for '{}' panicked", path);
                errors.push(ValidationError::new(Rule::Custom, "Validation failed"));
            }
        }
    }
    errors
}

enum Check<'t> {
    Leaf(FieldPath, &'t LeafField),
    Rows(FieldPath, &'t ArrayContainer),
}

/// Collects the checks for visible fields
struct Plan<'d, 'v, 't> {
    derived: &'d DerivedState,
    values: &'v Value,
    checks: Vec<Check<'t>>,
}

impl<'t> TreeVisitor<'t> for Plan<'_, '_, 't> {
    fn enter(&mut self, node: &'t FieldNode, scope: &FieldPath) -> bool {
        if let FieldNode::Array(array) = node {
            let array_path = scope.push_key(&array.name);
            if self.derived.is_hidden(&array_path.to_string()) {
                return false;
            }
            if array.min_rows.is_some() || array.max_rows.is_some() {
                self.checks.push(Check::Rows(array_path, array));
            }
        }
        true
    }

    fn leaf(&mut self, field: &'t LeafField, path: &FieldPath) {
        if self.derived.is_hidden(&path.to_string()) {
            return;
        }
        if path::get(self.values, path).is_none() && !field.required && field.validators.is_empty() {
            return;
        }
        self.checks.push(Check::Leaf(path.clone(), field));
    }
}

/// A `BoxFuture` resolver from a closure, for hosts that bring their own
/// schema library
pub struct FnResolver<F>(pub F);

#[async_trait]
impl<F> Resolver for FnResolver<F>
where
    F: Fn(Arc<Value>, Arc<DerivedState>) -> BoxFuture<'static, ErrorMap> + Send + Sync,
{
    async fn resolve(&self, values: Arc<Value>, derived: Arc<DerivedState>) -> ErrorMap {
        (self.0)(values, derived).await
    }
}
