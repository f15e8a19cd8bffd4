//! Field Tree Model
//!
//! The normalized, read-only form of a field definition. Leaf kinds hold
//! values; container kinds own child sequences and only contribute to data
//! paths when they declare a name (arrays always do).

use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::condition::Condition;
use super::path::FieldPath;

// ============================================================================
// Field Kinds
// ============================================================================

/// Value-holding field kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    Switch,
    Tags,
    Textarea,
    Upload,
}

impl FieldKind {
    /// Parse a definition's `type` discriminant
    pub fn from_type(field_type: &str) -> Option<Self> {
        Some(match field_type {
            "text" => FieldKind::Text,
            "email" => FieldKind::Email,
            "password" => FieldKind::Password,
            "number" => FieldKind::Number,
            "date" => FieldKind::Date,
            "select" => FieldKind::Select,
            "radio" => FieldKind::Radio,
            "checkbox" => FieldKind::Checkbox,
            "switch" => FieldKind::Switch,
            "tags" => FieldKind::Tags,
            "textarea" => FieldKind::Textarea,
            "upload" => FieldKind::Upload,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Switch => "switch",
            FieldKind::Tags => "tags",
            FieldKind::Textarea => "textarea",
            FieldKind::Upload => "upload",
        }
    }

    /// Kinds for which an unchecked `false` does not satisfy `required`
    pub fn is_toggle(&self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Switch)
    }

    /// Kinds that can carry an option set
    pub fn accepts_options(&self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::Radio | FieldKind::Checkbox)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dynamic Attributes
// ============================================================================

/// Synchronous attribute function over `(data, siblingData)`
pub type Computed<T> = Arc<dyn Fn(&Value, &Value) -> T + Send + Sync>;

/// An attribute that is either fixed or computed from the current data
pub enum Dynamic<T> {
    Literal(T),
    Computed(Computed<T>),
}

impl<T: Clone + Default> Dynamic<T> {
    pub fn computed(f: impl Fn(&Value, &Value) -> T + Send + Sync + 'static) -> Self {
        Dynamic::Computed(Arc::new(f))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Dynamic::Computed(_))
    }

    /// Resolve the attribute against a data snapshot. A computed attribute
    /// that panics resolves to `T::default()`.
    pub fn evaluate(&self, data: &Value, sibling: &Value) -> T {
        match self {
            Dynamic::Literal(value) => value.clone(),
            Dynamic::Computed(f) => match catch_unwind(AssertUnwindSafe(|| f(data, sibling))) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!("Computed field attribute panicked, falling back to default");
                    T::default()
                }
            },
        }
    }
}

impl<T: Default> Default for Dynamic<T> {
    fn default() -> Self {
        Dynamic::Literal(T::default())
    }
}

impl<T: Clone> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        match self {
            Dynamic::Literal(value) => Dynamic::Literal(value.clone()),
            Dynamic::Computed(f) => Dynamic::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Dynamic::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<bool> for Dynamic<bool> {
    fn from(value: bool) -> Self {
        Dynamic::Literal(value)
    }
}

impl From<Condition> for Dynamic<bool> {
    fn from(condition: Condition) -> Self {
        Dynamic::computed(move |data, sibling| condition.evaluate(data, sibling))
    }
}

/// Definitions accept a boolean or a declarative `Condition`
impl<'de> Deserialize<'de> for Dynamic<bool> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Literal(bool),
            Rule(Condition),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Literal(value) => Dynamic::Literal(value),
            Repr::Rule(condition) => condition.into(),
        })
    }
}

// ============================================================================
// Options
// ============================================================================

/// One selectable entry of a select/radio/checkbox-group field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    pub label: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl OptionEntry {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
            icon: None,
            disabled: false,
        }
    }
}

/// Input handed to an async option loader
#[derive(Clone, Debug)]
pub struct OptionContext {
    pub data: Arc<Value>,
    pub sibling_data: Value,
    pub path: String,
}

pub type OptionLoader =
    Arc<dyn Fn(OptionContext) -> BoxFuture<'static, anyhow::Result<Vec<OptionEntry>>> + Send + Sync>;

/// Where a field's option set comes from
#[derive(Clone)]
pub enum OptionSource {
    Static(Vec<OptionEntry>),
    /// Fetched again whenever one of the field's dependencies changes
    Dynamic(OptionLoader),
}

impl OptionSource {
    pub fn dynamic<F, Fut>(loader: F) -> Self
    where
        F: Fn(OptionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<OptionEntry>>> + Send + 'static,
    {
        OptionSource::Dynamic(Arc::new(move |ctx| loader(ctx).boxed()))
    }
}

impl fmt::Debug for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSource::Static(entries) => f.debug_tuple("Static").field(entries).finish(),
            OptionSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Definitions list options as entry objects or bare strings
impl<'de> Deserialize<'de> for OptionSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bare(String),
            Entry(OptionEntry),
        }

        let entries = Vec::<Repr>::deserialize(deserializer)?
            .into_iter()
            .map(|repr| match repr {
                Repr::Bare(text) => OptionEntry::new(text.clone(), text),
                Repr::Entry(entry) => entry,
            })
            .collect();
        Ok(OptionSource::Static(entries))
    }
}

// ============================================================================
// Custom Validators
// ============================================================================

/// Result of a custom validator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid {
            Verdict::Valid
        } else {
            Verdict::Invalid("Invalid value".to_string())
        }
    }
}

impl From<&str> for Verdict {
    fn from(message: &str) -> Self {
        Verdict::Invalid(message.to_string())
    }
}

impl From<String> for Verdict {
    fn from(message: String) -> Self {
        Verdict::Invalid(message)
    }
}

/// What a custom validator sees besides the value itself
#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub data: Arc<Value>,
    pub sibling_data: Value,
    pub path: String,
    pub kind: FieldKind,
}

pub type ValidatorFn =
    Arc<dyn Fn(Value, ValidationContext) -> BoxFuture<'static, anyhow::Result<Verdict>> + Send + Sync>;

/// A field-level `validate` function, run after the built-in rules
#[derive(Clone)]
pub struct CustomValidator(ValidatorFn);

impl CustomValidator {
    /// Wrap an async validator
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Verdict>> + Send + 'static,
    {
        Self(Arc::new(move |value, ctx| f(value, ctx).boxed()))
    }

    /// Wrap a synchronous validator
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value, &ValidationContext) -> Verdict + Send + Sync + 'static,
    {
        Self(Arc::new(move |value, ctx| {
            let verdict = f(&value, &ctx);
            async move { Ok::<_, anyhow::Error>(verdict) }.boxed()
        }))
    }

    pub fn call(&self, value: Value, ctx: ValidationContext) -> BoxFuture<'static, anyhow::Result<Verdict>> {
        (self.0)(value, ctx)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Presentation hints carried through to renderers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Built-in rule parameters of a leaf
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_selected: Option<usize>,
    pub max_selected: Option<usize>,
}

/// A dependency after scope resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyRef {
    /// Schema-level path of the named field or container
    Resolved(FieldPath),
    /// Nothing in scope carries this name; reads yield null
    Unresolved(String),
}

/// A value-holding field
#[derive(Clone, Debug)]
pub struct LeafField {
    pub kind: FieldKind,
    pub name: String,
    /// `None` when the definition set `label: false`
    pub label: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub hidden: Dynamic<bool>,
    /// Shown only while this evaluates true
    pub condition: Option<Dynamic<bool>>,
    pub disabled: Dynamic<bool>,
    pub read_only: Dynamic<bool>,
    pub default_value: Option<Value>,
    pub style: FieldStyle,
    pub ui: Map<String, Value>,
    pub constraints: Constraints,
    pub options: Option<OptionSource>,
    pub validators: Vec<CustomValidator>,
    /// Declared dependency names; `None` means the whole form
    pub dependencies: Option<Vec<String>>,
    pub(crate) resolved_dependencies: Option<Vec<DependencyRef>>,
    pub(crate) template_path: FieldPath,
}

impl LeafField {
    /// Schema-level path (`contacts.*.email` for array row fields)
    pub fn template_path(&self) -> &FieldPath {
        &self.template_path
    }

    pub fn resolved_dependencies(&self) -> Option<&[DependencyRef]> {
        self.resolved_dependencies.as_deref()
    }

    /// True if any attribute needs the current data to be resolved
    pub fn has_computed_state(&self) -> bool {
        self.hidden.is_computed()
            || self.disabled.is_computed()
            || self.read_only.is_computed()
            || self.condition.as_ref().map_or(false, Dynamic::is_computed)
    }
}

/// `row`, `group` and `collapsible`
#[derive(Clone, Debug, Default)]
pub struct Container {
    pub name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub hidden: Dynamic<bool>,
    pub fields: Vec<FieldNode>,
}

#[derive(Clone, Debug)]
pub struct Tab {
    /// A named tab namespaces its fields
    pub name: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub fields: Vec<FieldNode>,
}

#[derive(Clone, Debug, Default)]
pub struct TabsContainer {
    pub name: Option<String>,
    pub hidden: Dynamic<bool>,
    /// `ui.defaultTab`, resolved like any other computed attribute
    pub default_tab: Dynamic<Option<String>>,
    pub tabs: Vec<Tab>,
}

/// A repeatable row template
#[derive(Clone, Debug)]
pub struct ArrayContainer {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub hidden: Dynamic<bool>,
    pub fields: Vec<FieldNode>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,
}

/// One node of a normalized field tree
#[derive(Clone, Debug)]
pub enum FieldNode {
    Leaf(LeafField),
    Row(Container),
    Group(Container),
    Collapsible(Container),
    Tabs(TabsContainer),
    Array(ArrayContainer),
}

impl FieldNode {
    /// The data-path segment this node contributes, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            FieldNode::Leaf(field) => Some(&field.name),
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => c.name.as_deref(),
            FieldNode::Tabs(t) => t.name.as_deref(),
            FieldNode::Array(a) => Some(&a.name),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldNode::Leaf(field) => field.kind.as_str(),
            FieldNode::Row(_) => "row",
            FieldNode::Group(_) => "group",
            FieldNode::Collapsible(_) => "collapsible",
            FieldNode::Tabs(_) => "tabs",
            FieldNode::Array(_) => "array",
        }
    }

    /// The container-level `hidden` attribute; leaves answer with their own
    pub fn hidden(&self) -> &Dynamic<bool> {
        match self {
            FieldNode::Leaf(field) => &field.hidden,
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => &c.hidden,
            FieldNode::Tabs(t) => &t.hidden,
            FieldNode::Array(a) => &a.hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dynamic_literal_and_computed() {
        let data = json!({ "emailNotifications": false });
        let literal: Dynamic<bool> = true.into();
        let computed: Dynamic<bool> =
            Dynamic::computed(|data, _| !data["emailNotifications"].as_bool().unwrap_or(false));

        assert!(literal.evaluate(&data, &data));
        assert!(computed.evaluate(&data, &data));
        assert!(!computed.evaluate(&json!({ "emailNotifications": true }), &json!({})));
    }

    #[test]
    fn test_dynamic_panic_defaults_to_false() {
        let exploding: Dynamic<bool> = Dynamic::computed(|_, _| panic!("boom"));
        assert!(!exploding.evaluate(&json!({}), &json!({})));
    }

    #[test]
    fn test_dynamic_deserializes_from_condition() {
        let hidden: Dynamic<bool> = serde_json::from_value(json!({ "falsy": "enabled" })).unwrap();
        assert!(hidden.is_computed());
        assert!(hidden.evaluate(&json!({ "enabled": false }), &json!({})));

        let literal: Dynamic<bool> = serde_json::from_value(json!(true)).unwrap();
        assert!(!literal.is_computed());
    }

    #[test]
    fn test_option_source_accepts_bare_strings() {
        let source: OptionSource =
            serde_json::from_value(json!(["red", { "label": "Blue", "value": "blue" }])).unwrap();
        match source {
            OptionSource::Static(entries) => {
                assert_eq!(entries[0], OptionEntry::new("red", "red"));
                assert_eq!(entries[1].label, "Blue");
            }
            OptionSource::Dynamic(_) => panic!("expected static options"),
        }
    }

    #[test]
    fn test_verdict_conversions() {
        assert_eq!(Verdict::from(true), Verdict::Valid);
        assert_eq!(Verdict::from("mismatch"), Verdict::Invalid("mismatch".into()));
    }
}
