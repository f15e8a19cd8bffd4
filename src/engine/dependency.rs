//! Dependency Engine
//!
//! Derives per-field state (hidden, disabled, read-only, options) from a
//! values snapshot and plans async option fetches. It reads snapshots only;
//! the store owns the values and applies fetch results through
//! `complete_fetch`.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::domain::error::DependencyError;
use crate::domain::field::{
    DependencyRef, FieldNode, LeafField, OptionContext, OptionEntry, OptionLoader, OptionSource, Tab,
};
use crate::domain::path::{self, FieldPath};
use crate::domain::tree::{FormTree, TreeVisitor};

// ============================================================================
// Derived State
// ============================================================================

/// Computed state of one field or named container
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub hidden: bool,
    pub disabled: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionEntry>>,
    pub options_loading: bool,
}

/// Field state for every concrete path of one snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    pub fields: BTreeMap<String, FieldState>,
    /// Resolved `ui.defaultTab` per tabs container, keyed by the container's
    /// path (an unnamed container is keyed by its enclosing scope)
    pub default_tabs: BTreeMap<String, Option<String>>,
}

impl DerivedState {
    pub fn field(&self, path: &str) -> Option<&FieldState> {
        self.fields.get(path)
    }

    /// Unknown paths count as visible
    pub fn is_hidden(&self, path: &str) -> bool {
        self.fields.get(path).map_or(false, |state| state.hidden)
    }

    /// True when `path` exists in this snapshot and is not hidden
    pub fn is_visible(&self, path: &str) -> bool {
        self.fields.get(path).map_or(false, |state| !state.hidden)
    }

    pub fn default_tab(&self, key: &str) -> Option<&str> {
        self.default_tabs.get(key).and_then(|tab| tab.as_deref())
    }
}

/// An option fetch the store must run
pub struct FetchRequest {
    pub path: FieldPath,
    pub token: u64,
    pub loader: OptionLoader,
    pub context: OptionContext,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("path", &self.path)
            .field("token", &self.token)
            .finish()
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug)]
struct CachedPredicates {
    fingerprint: Vec<Value>,
    hidden: bool,
    disabled: bool,
    read_only: bool,
}

#[derive(Debug, Default)]
struct OptionSlot {
    fingerprint: Option<Value>,
    /// Token of the latest issued request
    token: u64,
    loading: bool,
    options: Vec<OptionEntry>,
}

/// Recomputes derived field state and tracks dynamic option sets
#[derive(Debug)]
pub struct DependencyEngine {
    tree: Arc<FormTree>,
    predicates: HashMap<FieldPath, CachedPredicates>,
    slots: HashMap<FieldPath, OptionSlot>,
    reported: HashSet<(String, String)>,
    next_token: u64,
}

impl DependencyEngine {
    pub fn new(tree: Arc<FormTree>) -> Self {
        Self {
            tree,
            predicates: HashMap::new(),
            slots: HashMap::new(),
            reported: HashSet::new(),
            next_token: 0,
        }
    }

    /// Evaluate every field's computed attributes against `values`
    pub fn derive(&mut self, values: &Value) -> DerivedState {
        let tree = Arc::clone(&self.tree);
        let mut deriver = Deriver {
            engine: self,
            values,
            hidden_stack: Vec::new(),
            state: DerivedState::default(),
            seen: HashSet::new(),
        };
        tree.walk(values, &mut deriver);

        let Deriver { state, seen, .. } = deriver;
        self.predicates.retain(|path, _| seen.contains(path));
        state
    }

    /// Issue fetches for dynamic option fields whose dependencies changed.
    /// Fields without a dependency list refetch on any change of the form.
    pub fn plan_fetches(&mut self, values: &Arc<Value>) -> Vec<FetchRequest> {
        let tree = Arc::clone(&self.tree);
        let mut requests = Vec::new();
        let mut present = HashSet::new();

        for (path, leaf) in tree.leaves(values) {
            let loader = match &leaf.options {
                Some(OptionSource::Dynamic(loader)) => Arc::clone(loader),
                _ => continue,
            };
            present.insert(path.clone());

            let fingerprint = match self.dependency_values(leaf, &path, values) {
                Some(deps) => Value::Array(deps),
                None => (**values).clone(),
            };

            let slot = self.slots.entry(path.clone()).or_default();
            if slot.token != 0 && slot.fingerprint.as_ref() == Some(&fingerprint) {
                continue;
            }

            self.next_token += 1;
            slot.token = self.next_token;
            slot.fingerprint = Some(fingerprint);
            slot.loading = true;

            tracing::debug!("Fetching options for '{}' (request {})", path, slot.token);
            requests.push(FetchRequest {
                context: OptionContext {
                    data: Arc::clone(values),
                    sibling_data: path::sibling_data(values, &path).clone(),
                    path: path.to_string(),
                },
                path,
                token: self.next_token,
                loader,
            });
        }

        self.slots.retain(|path, _| present.contains(path));
        requests
    }

    /// Apply a finished fetch. Returns false when the result was stale and
    /// discarded. A failed fetch keeps the previous option set.
    pub fn complete_fetch(
        &mut self,
        path: &FieldPath,
        token: u64,
        result: anyhow::Result<Vec<OptionEntry>>,
    ) -> bool {
        let slot = match self.slots.get_mut(path) {
            Some(slot) if slot.token == token => slot,
            _ => {
                tracing::debug!("Discarding stale options for '{}' (request {})", path, token);
                return false;
            }
        };

        slot.loading = false;
        match result {
            Ok(options) => slot.options = options,
            Err(e) => {
                let err = DependencyError::OptionLoader {
                    field: path.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", err);
            }
        }
        true
    }

    /// True while any option fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.slots.values().any(|slot| slot.loading)
    }

    /// Current values of a leaf's declared dependencies, or `None` when the
    /// leaf depends on the whole form
    fn dependency_values(&mut self, leaf: &LeafField, path: &FieldPath, values: &Value) -> Option<Vec<Value>> {
        let deps = leaf.resolved_dependencies()?;
        Some(
            deps.iter()
                .map(|dep| match dep {
                    DependencyRef::Resolved(target) => path::get(values, &target.instantiate(path))
                        .cloned()
                        .unwrap_or(Value::Null),
                    DependencyRef::Unresolved(name) => {
                        if self.reported.insert((path.template().to_string(), name.clone())) {
                            let err = DependencyError::UnknownField {
                                field: path.template().to_string(),
                                dependency: name.clone(),
                            };
                            tracing::warn!("{}", err);
                        }
                        Value::Null
                    }
                })
                .collect(),
        )
    }
}

// ============================================================================
// Derivation Walk
// ============================================================================

struct Deriver<'e, 'v> {
    engine: &'e mut DependencyEngine,
    values: &'v Value,
    /// Effective hidden flag of each enclosing container
    hidden_stack: Vec<bool>,
    state: DerivedState,
    seen: HashSet<FieldPath>,
}

impl Deriver<'_, '_> {
    fn parent_hidden(&self) -> bool {
        self.hidden_stack.last().copied().unwrap_or(false)
    }
}

impl<'t> TreeVisitor<'t> for Deriver<'_, '_> {
    fn enter(&mut self, node: &'t FieldNode, scope: &FieldPath) -> bool {
        let sibling = path::scope_data(self.values, scope);
        let hidden = self.parent_hidden() || node.hidden().evaluate(self.values, sibling);
        self.hidden_stack.push(hidden);

        if let Some(name) = node.name() {
            self.state.fields.insert(
                scope.push_key(name).to_string(),
                FieldState {
                    hidden,
                    ..Default::default()
                },
            );
        }

        if let FieldNode::Tabs(tabs) = node {
            let key = match &tabs.name {
                Some(name) => scope.push_key(name),
                None => scope.clone(),
            };
            let tab = tabs.default_tab.evaluate(self.values, sibling);
            self.state.default_tabs.insert(key.to_string(), tab);
        }
        true
    }

    fn leave(&mut self, _node: &'t FieldNode, _scope: &FieldPath) {
        self.hidden_stack.pop();
    }

    fn enter_tab(&mut self, tab: &'t Tab, _index: usize, scope: &FieldPath) -> bool {
        if let Some(name) = &tab.name {
            let hidden = self.parent_hidden();
            self.state.fields.insert(
                scope.push_key(name).to_string(),
                FieldState {
                    hidden,
                    ..Default::default()
                },
            );
        }
        true
    }

    fn leaf(&mut self, field: &'t LeafField, path: &FieldPath) {
        let sibling = path::sibling_data(self.values, path);
        let fingerprint = self.engine.dependency_values(field, path, self.values);
        self.seen.insert(path.clone());

        let cached = match (&fingerprint, self.engine.predicates.get(path)) {
            (Some(current), Some(cached)) if &cached.fingerprint == current => {
                Some((cached.hidden, cached.disabled, cached.read_only))
            }
            _ => None,
        };

        let (own_hidden, disabled, read_only) = match cached {
            Some(evaluated) => evaluated,
            None => {
                let shown = field
                    .condition
                    .as_ref()
                    .map_or(true, |condition| condition.evaluate(self.values, sibling));
                let evaluated = (
                    field.hidden.evaluate(self.values, sibling) || !shown,
                    field.disabled.evaluate(self.values, sibling),
                    field.read_only.evaluate(self.values, sibling),
                );
                if let Some(fingerprint) = fingerprint {
                    self.engine.predicates.insert(
                        path.clone(),
                        CachedPredicates {
                            fingerprint,
                            hidden: evaluated.0,
                            disabled: evaluated.1,
                            read_only: evaluated.2,
                        },
                    );
                }
                evaluated
            }
        };

        let (options, options_loading) = match &field.options {
            Some(OptionSource::Static(entries)) => (Some(entries.clone()), false),
            Some(OptionSource::Dynamic(_)) => match self.engine.slots.get(path) {
                Some(slot) => (Some(slot.options.clone()), slot.loading),
                None => (Some(Vec::new()), false),
            },
            None => (None, false),
        };

        self.state.fields.insert(
            path.to_string(),
            FieldState {
                hidden: self.parent_hidden() || own_hidden,
                disabled,
                read_only,
                options,
                options_loading,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::FieldDef;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(defs: Vec<FieldDef>) -> DependencyEngine {
        DependencyEngine::new(Arc::new(FormTree::from_defs(defs).unwrap()))
    }

    #[test]
    fn test_disabled_follows_data() {
        let mut engine = engine(vec![
            FieldDef::switch("emailNotifications"),
            FieldDef::switch("weeklyDigest")
                .disabled_when(|data, _| !data["emailNotifications"].as_bool().unwrap_or(false)),
        ]);

        let on = engine.derive(&json!({ "emailNotifications": true }));
        assert!(!on.field("weeklyDigest").unwrap().disabled);

        let off = engine.derive(&json!({ "emailNotifications": false }));
        assert!(off.field("weeklyDigest").unwrap().disabled);
    }

    #[test]
    fn test_explicit_dependencies_gate_reevaluation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut engine = engine(vec![
            FieldDef::text("plan"),
            FieldDef::text("notes"),
            FieldDef::text("seats")
                .depends_on(["plan"])
                .hidden_when(move |data, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    data["plan"] == "free"
                }),
        ]);

        engine.derive(&json!({ "plan": "pro", "notes": "a" }));
        engine.derive(&json!({ "plan": "pro", "notes": "ab" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let state = engine.derive(&json!({ "plan": "free", "notes": "ab" }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(state.is_hidden("seats"));
    }

    #[test]
    fn test_condition_and_container_hidden_propagate() {
        let mut engine = engine(vec![
            FieldDef::checkbox("hasCompany"),
            FieldDef::text("company").show_when(|data, _| data["hasCompany"] == true),
            FieldDef::group(vec![FieldDef::text("cardNumber")])
                .named("billing")
                .hidden_when(|data, _| data["hasCompany"] != true),
        ]);

        let state = engine.derive(&json!({ "hasCompany": false }));
        assert!(state.is_hidden("company"));
        assert!(state.is_hidden("billing"));
        assert!(state.is_hidden("billing.cardNumber"));

        let state = engine.derive(&json!({ "hasCompany": true }));
        assert!(!state.is_hidden("company"));
        assert!(!state.is_hidden("billing.cardNumber"));
    }

    #[test]
    fn test_row_predicates_read_sibling_data() {
        let mut engine = engine(vec![FieldDef::array(
            "contacts",
            vec![
                FieldDef::select("kind"),
                FieldDef::text("phone").hidden_when(|_, row| row["kind"] != "phone"),
            ],
        )]);

        let state = engine.derive(&json!({ "contacts": [{ "kind": "phone" }, { "kind": "email" }] }));
        assert!(!state.is_hidden("contacts.0.phone"));
        assert!(state.is_hidden("contacts.1.phone"));
    }

    #[test]
    fn test_unresolved_dependency_reads_null() {
        let mut engine = engine(vec![FieldDef::text("notes")
            .depends_on(["missing"])
            .hidden_when(|_, _| false)]);

        let state = engine.derive(&json!({ "notes": "x" }));
        assert!(!state.is_hidden("notes"));
    }

    #[test]
    fn test_default_tab_resolves_through_computed_attribute() {
        let mut engine = engine(vec![
            FieldDef::switch("advanced"),
            FieldDef::tabs(vec![]).named("sections").default_tab_when(|data, _| {
                if data["advanced"] == true {
                    Some("expert".to_string())
                } else {
                    Some("basics".to_string())
                }
            }),
        ]);

        let state = engine.derive(&json!({ "advanced": true }));
        assert_eq!(state.default_tab("sections"), Some("expert"));
    }

    #[test]
    fn test_fetch_plan_last_request_wins() {
        let mut engine = engine(vec![
            FieldDef::text("region"),
            FieldDef::select("country")
                .depends_on(["region"])
                .options_from(|_ctx| async { Ok(vec![]) }),
        ]);

        let first = engine.plan_fetches(&Arc::new(json!({ "region": "eu" })));
        assert_eq!(first.len(), 1);
        assert!(engine.plan_fetches(&Arc::new(json!({ "region": "eu", "x": 1 }))).is_empty());

        let second = engine.plan_fetches(&Arc::new(json!({ "region": "us" })));
        let path = FieldPath::parse("country");

        assert!(engine.complete_fetch(&path, second[0].token, Ok(vec![OptionEntry::new("US", "us")])));
        assert!(!engine.complete_fetch(&path, first[0].token, Ok(vec![OptionEntry::new("DE", "de")])));

        let state = engine.derive(&json!({ "region": "us" }));
        let country = state.field("country").unwrap();
        assert_eq!(country.options.as_ref().unwrap()[0].label, "US");
        assert!(!country.options_loading);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_options() {
        let mut engine = engine(vec![
            FieldDef::text("region"),
            FieldDef::select("country")
                .depends_on(["region"])
                .options_from(|_ctx| async { Ok(vec![]) }),
        ]);
        let path = FieldPath::parse("country");

        let first = engine.plan_fetches(&Arc::new(json!({ "region": "eu" })));
        engine.complete_fetch(&path, first[0].token, Ok(vec![OptionEntry::new("DE", "de")]));

        let second = engine.plan_fetches(&Arc::new(json!({ "region": "us" })));
        assert!(engine.is_loading());
        engine.complete_fetch(&path, second[0].token, Err(anyhow::anyhow!("network down")));
        assert!(!engine.is_loading());

        let state = engine.derive(&json!({ "region": "us" }));
        assert_eq!(state.field("country").unwrap().options.as_ref().unwrap()[0].label, "DE");
    }
}
