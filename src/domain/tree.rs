//! Field tree normalization and traversal
//!
//! `FormTree` is the read-only, normalized form of a field definition list.
//! Building one is the only place `SchemaError`s are raised; afterwards the
//! tree is shared by the dependency engine, the validation engine, the store
//! and renderers.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::definition::{FieldDef, LabelDef, TabDef};
use super::error::SchemaError;
use super::field::{
    ArrayContainer, Constraints, Container, DependencyRef, Dynamic, FieldKind, FieldNode, LeafField, Tab,
    TabsContainer,
};
use super::path::{self, resolve_path, Ancestor, FieldPath};

/// A normalized field tree
#[derive(Clone, Debug, Default)]
pub struct FormTree {
    nodes: Vec<FieldNode>,
}

impl FormTree {
    /// Normalize a list of field definitions
    pub fn from_defs(defs: Vec<FieldDef>) -> Result<Self, SchemaError> {
        let mut nodes = normalize_nodes(defs, "fields", &[])?;

        let known = named_paths(&nodes);
        resolve_dependencies(&mut nodes, &known);

        let tree = Self { nodes };
        tree.check_acyclic()?;

        tracing::debug!(
            "Normalized form tree with {} value fields",
            tree.template_paths().len()
        );
        Ok(tree)
    }

    /// Normalize a JSON value holding either a field list or `{ "fields": [...] }`
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let list = match value {
            Value::Object(mut map) if map.contains_key("fields") => map.remove("fields").unwrap_or_default(),
            other => other,
        };
        let defs: Vec<FieldDef> =
            serde_json::from_value(list).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_defs(defs)
    }

    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(source).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_yaml::from_str(source).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn nodes(&self) -> &[FieldNode] {
        &self.nodes
    }

    /// Walk the tree against concrete values; arrays expand to their rows
    pub fn walk<'t, V: TreeVisitor<'t> + ?Sized>(&'t self, values: &Value, visitor: &mut V) {
        walk_nodes(&self.nodes, &FieldPath::root(), Some(values), visitor);
    }

    /// Walk the schema itself; arrays contribute a single `*` row
    pub fn walk_template<'t, V: TreeVisitor<'t> + ?Sized>(&'t self, visitor: &mut V) {
        walk_nodes(&self.nodes, &FieldPath::root(), None, visitor);
    }

    /// Every value-holding leaf with its concrete path
    pub fn leaves(&self, values: &Value) -> Vec<(FieldPath, &LeafField)> {
        let mut collector = LeafCollector::default();
        self.walk(values, &mut collector);
        collector.leaves
    }

    /// Schema-level paths of every value-holding leaf, in tree order
    pub fn template_paths(&self) -> Vec<FieldPath> {
        let mut collector = LeafCollector::default();
        self.walk_template(&mut collector);
        collector.leaves.into_iter().map(|(path, _)| path).collect()
    }

    /// Look up a leaf by its template path
    pub fn leaf(&self, template: &FieldPath) -> Option<&LeafField> {
        let mut collector = LeafCollector::default();
        self.walk_template(&mut collector);
        collector
            .leaves
            .into_iter()
            .find(|(path, _)| path == template)
            .map(|(_, leaf)| leaf)
    }

    /// Look up an array container by its template path
    pub fn array(&self, template: &FieldPath) -> Option<&ArrayContainer> {
        struct Find<'p, 't> {
            target: &'p FieldPath,
            found: Option<&'t ArrayContainer>,
        }

        impl<'p, 't> TreeVisitor<'t> for Find<'p, 't> {
            fn enter(&mut self, node: &'t FieldNode, scope: &FieldPath) -> bool {
                if let FieldNode::Array(array) = node {
                    if &scope.push_key(&array.name) == self.target {
                        self.found = Some(array);
                    }
                }
                self.found.is_none()
            }

            fn leaf(&mut self, _field: &'t LeafField, _path: &FieldPath) {}
        }

        let mut find = Find {
            target: template,
            found: None,
        };
        self.walk_template(&mut find);
        find.found
    }

    /// Fill `base` with each field's `defaultValue` where no value is present.
    /// Values already in `base` always win.
    pub fn seed(&self, base: Value) -> Value {
        let mut values = if base.is_object() {
            base
        } else {
            Value::Object(Map::new())
        };

        let mut collector = LeafCollector::default();
        self.walk(&values, &mut collector);
        let missing: Vec<(FieldPath, Value)> = collector
            .leaves
            .into_iter()
            .filter(|(path, _)| path::get(&values, path).is_none())
            .filter_map(|(path, leaf)| leaf.default_value.clone().map(|v| (path, v)))
            .collect();

        for (path, value) in missing {
            if let Err(e) = path::set(&mut values, &path, value) {
                tracing::warn!("Failed to seed default value: {}", e);
            }
        }
        values
    }

    /// Verify that declared dependencies form no cycle between leaves
    fn check_acyclic(&self) -> Result<(), SchemaError> {
        let mut collector = LeafCollector::default();
        self.walk_template(&mut collector);
        let leaves = collector.leaves;

        let edges: Vec<Vec<usize>> = leaves
            .iter()
            .map(|(own, leaf)| {
                let deps = leaf.resolved_dependencies().unwrap_or_default();
                leaves
                    .iter()
                    .enumerate()
                    .filter(|(_, (other, _))| other != own)
                    .filter(|(_, (other, _))| {
                        deps.iter().any(|dep| match dep {
                            // An enclosing container is context, not an edge to its other leaves
                            DependencyRef::Resolved(target) => {
                                let target = target.template();
                                !own.starts_with(&target) && other.starts_with(&target)
                            }
                            DependencyRef::Unresolved(_) => false,
                        })
                    })
                    .map(|(idx, _)| idx)
                    .collect()
            })
            .collect();

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut marks = vec![0u8; leaves.len()];
        let mut stack = Vec::new();
        for start in 0..leaves.len() {
            if marks[start] == 0 {
                if let Some(cycle) = find_cycle(start, &edges, &mut marks, &mut stack) {
                    return Err(SchemaError::DependencyCycle {
                        cycle: cycle.into_iter().map(|i| leaves[i].0.to_string()).collect(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn find_cycle(node: usize, edges: &[Vec<usize>], marks: &mut [u8], stack: &mut Vec<usize>) -> Option<Vec<usize>> {
    marks[node] = 1;
    stack.push(node);

    for &next in &edges[node] {
        match marks[next] {
            0 => {
                if let Some(cycle) = find_cycle(next, edges, marks, stack) {
                    return Some(cycle);
                }
            }
            1 => {
                let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            _ => {}
        }
    }

    stack.pop();
    marks[node] = 2;
    None
}

// ============================================================================
// Traversal
// ============================================================================

/// Callbacks for a recursive walk over a field tree.
///
/// `scope` is the data path a node sits in; a named container's own path is
/// `scope.push_key(name)`.
pub trait TreeVisitor<'t> {
    /// Called before a container's children; returning `false` skips them
    fn enter(&mut self, _node: &'t FieldNode, _scope: &FieldPath) -> bool {
        true
    }

    fn leave(&mut self, _node: &'t FieldNode, _scope: &FieldPath) {}

    /// Called before a tab's fields; returning `false` skips them
    fn enter_tab(&mut self, _tab: &'t Tab, _index: usize, _scope: &FieldPath) -> bool {
        true
    }

    fn leave_tab(&mut self, _tab: &'t Tab, _index: usize, _scope: &FieldPath) {}

    /// Called before each row of an array; `row` is the row's own path
    fn enter_row(&mut self, _array: &'t ArrayContainer, _row: &FieldPath) {}

    fn leave_row(&mut self, _array: &'t ArrayContainer, _row: &FieldPath) {}

    fn leaf(&mut self, field: &'t LeafField, path: &FieldPath);
}

/// Walk `nodes` positioned under `scope`. With `values`, arrays expand to the
/// rows present in the data; without, to a single template row.
pub fn walk_nodes<'t, V: TreeVisitor<'t> + ?Sized>(
    nodes: &'t [FieldNode],
    scope: &FieldPath,
    values: Option<&Value>,
    visitor: &mut V,
) {
    for node in nodes {
        match node {
            FieldNode::Leaf(field) => visitor.leaf(field, &scope.push_key(&field.name)),
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => {
                if visitor.enter(node, scope) {
                    let inner = named_scope(scope, c.name.as_deref());
                    walk_nodes(&c.fields, &inner, values, visitor);
                }
                visitor.leave(node, scope);
            }
            FieldNode::Tabs(t) => {
                if visitor.enter(node, scope) {
                    let tabs_scope = named_scope(scope, t.name.as_deref());
                    for (index, tab) in t.tabs.iter().enumerate() {
                        if visitor.enter_tab(tab, index, &tabs_scope) {
                            let inner = named_scope(&tabs_scope, tab.name.as_deref());
                            walk_nodes(&tab.fields, &inner, values, visitor);
                        }
                        visitor.leave_tab(tab, index, &tabs_scope);
                    }
                }
                visitor.leave(node, scope);
            }
            FieldNode::Array(a) => {
                if visitor.enter(node, scope) {
                    let array_path = scope.push_key(&a.name);
                    match values {
                        Some(values) => {
                            let rows = path::get(values, &array_path)
                                .and_then(Value::as_array)
                                .map_or(0, Vec::len);
                            for idx in 0..rows {
                                let row = array_path.push_index(idx);
                                visitor.enter_row(a, &row);
                                walk_nodes(&a.fields, &row, Some(values), visitor);
                                visitor.leave_row(a, &row);
                            }
                        }
                        None => {
                            let row = array_path.push_each();
                            visitor.enter_row(a, &row);
                            walk_nodes(&a.fields, &row, None, visitor);
                            visitor.leave_row(a, &row);
                        }
                    }
                }
                visitor.leave(node, scope);
            }
        }
    }
}

fn named_scope(scope: &FieldPath, name: Option<&str>) -> FieldPath {
    match name {
        Some(name) => scope.push_key(name),
        None => scope.clone(),
    }
}

#[derive(Default)]
struct LeafCollector<'t> {
    leaves: Vec<(FieldPath, &'t LeafField)>,
}

impl<'t> TreeVisitor<'t> for LeafCollector<'t> {
    fn leaf(&mut self, field: &'t LeafField, path: &FieldPath) {
        self.leaves.push((path.clone(), field));
    }
}

/// Values for a new array row, built from the row template's defaults
pub fn row_defaults(array: &ArrayContainer) -> Value {
    struct Defaults(Value);

    impl<'t> TreeVisitor<'t> for Defaults {
        fn leaf(&mut self, field: &'t LeafField, path: &FieldPath) {
            if let Some(value) = &field.default_value {
                if let Err(e) = path::set(&mut self.0, path, value.clone()) {
                    tracing::warn!("Failed to seed row default: {}", e);
                }
            }
        }
    }

    let mut defaults = Defaults(Value::Object(Map::new()));
    walk_nodes(&array.fields, &FieldPath::root(), Some(&Value::Null), &mut defaults);
    defaults.0
}

// ============================================================================
// Normalization
// ============================================================================

fn normalize_nodes(
    defs: Vec<FieldDef>,
    location: &str,
    chain: &[Ancestor<'_>],
) -> Result<Vec<FieldNode>, SchemaError> {
    let mut nodes = Vec::with_capacity(defs.len());

    for (idx, def) in defs.into_iter().enumerate() {
        let here = format!("{}[{}]", location, idx);
        nodes.push(normalize_node(def, &here, chain)?);
    }

    check_unique_names(&nodes, chain)?;
    Ok(nodes)
}

fn normalize_node(mut def: FieldDef, location: &str, chain: &[Ancestor<'_>]) -> Result<FieldNode, SchemaError> {
    let field_type = def
        .field_type
        .take()
        .ok_or_else(|| SchemaError::MissingType {
            location: location.to_string(),
        })?;

    let name = def.name.take().filter(|n| !n.is_empty());
    check_name(name.as_deref(), location)?;
    let hidden = def.hidden.take().unwrap_or_default();

    match field_type.as_str() {
        "row" | "group" | "collapsible" => {
            let mut inner = chain.to_vec();
            inner.push(name.as_deref().map_or(Ancestor::Anonymous, Ancestor::Named));
            let fields = normalize_nodes(std::mem::take(&mut def.fields), &format!("{}.fields", location), &inner)?;

            let container = Container {
                label: resolve_label(def.label, name.as_deref()),
                name,
                description: def.description,
                hidden,
                fields,
            };
            Ok(match field_type.as_str() {
                "row" => FieldNode::Row(container),
                "group" => FieldNode::Group(container),
                _ => FieldNode::Collapsible(container),
            })
        }
        "tabs" => {
            let mut tabs_chain = chain.to_vec();
            tabs_chain.push(name.as_deref().map_or(Ancestor::Anonymous, Ancestor::Named));

            let mut tabs = Vec::with_capacity(def.tabs.len());
            for (idx, tab) in std::mem::take(&mut def.tabs).into_iter().enumerate() {
                tabs.push(normalize_tab(tab, idx, &format!("{}.tabs[{}]", location, idx), &tabs_chain)?);
            }

            let default_tab = def.default_tab.take().unwrap_or_else(|| {
                Dynamic::Literal(def.ui.get("defaultTab").and_then(Value::as_str).map(String::from))
            });

            Ok(FieldNode::Tabs(TabsContainer {
                name,
                hidden,
                default_tab,
                tabs,
            }))
        }
        "array" => {
            let name = name.ok_or_else(|| SchemaError::MissingName {
                location: location.to_string(),
            })?;
            check_bounds(&name, ("minRows", "maxRows"), def.min_rows, def.max_rows)?;

            let mut inner = chain.to_vec();
            inner.push(Ancestor::Named(&name));
            inner.push(Ancestor::Template);
            let fields = normalize_nodes(std::mem::take(&mut def.fields), &format!("{}.fields", location), &inner)?;

            Ok(FieldNode::Array(ArrayContainer {
                label: resolve_label(def.label, Some(&name)),
                name,
                description: def.description,
                hidden,
                fields,
                min_rows: def.min_rows,
                max_rows: def.max_rows,
            }))
        }
        other => {
            let kind = FieldKind::from_type(other).ok_or_else(|| SchemaError::UnknownType {
                field_type: other.to_string(),
                location: location.to_string(),
            })?;
            let name = name.ok_or_else(|| SchemaError::MissingName {
                location: location.to_string(),
            })?;
            normalize_leaf(def, kind, name, hidden, chain).map(FieldNode::Leaf)
        }
    }
}

fn normalize_tab(tab: TabDef, idx: usize, location: &str, chain: &[Ancestor<'_>]) -> Result<Tab, SchemaError> {
    let name = tab.name.filter(|n| !n.is_empty());
    check_name(name.as_deref(), location)?;
    let mut inner = chain.to_vec();
    inner.push(name.as_deref().map_or(Ancestor::Anonymous, Ancestor::Named));
    let fields = normalize_nodes(tab.fields, &format!("{}.fields", location), &inner)?;

    Ok(Tab {
        label: tab
            .label
            .or_else(|| name.clone())
            .unwrap_or_else(|| format!("Tab {}", idx + 1)),
        name,
        description: tab.description,
        fields,
    })
}

fn normalize_leaf(
    def: FieldDef,
    kind: FieldKind,
    name: String,
    hidden: Dynamic<bool>,
    chain: &[Ancestor<'_>],
) -> Result<LeafField, SchemaError> {
    check_bounds(&name, ("minLength", "maxLength"), def.min_length, def.max_length)?;
    check_bounds(&name, ("min", "max"), def.min, def.max)?;
    check_bounds(&name, ("minSelected", "maxSelected"), def.min_selected, def.max_selected)?;

    let pattern = def
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| SchemaError::InvalidPattern {
            field: name.clone(),
            reason: e.to_string(),
        })?;

    let mut full_chain = chain.to_vec();
    full_chain.push(Ancestor::Named(&name));
    let template_path = resolve_path(&full_chain);

    Ok(LeafField {
        kind,
        label: resolve_label(def.label, Some(&name)),
        description: def.description,
        required: def.required,
        hidden,
        condition: def.condition,
        disabled: def.disabled.unwrap_or_default(),
        read_only: def.read_only.unwrap_or_default(),
        default_value: def.default_value,
        style: def.style,
        ui: def.ui,
        constraints: Constraints {
            min_length: def.min_length,
            max_length: def.max_length,
            pattern,
            min: def.min,
            max: def.max,
            min_selected: def.min_selected,
            max_selected: def.max_selected,
        },
        options: def.options,
        validators: def.validators,
        dependencies: def.dependencies,
        resolved_dependencies: None,
        template_path,
        name,
    })
}

/// Names must read back as a single key segment of a parsed path
fn check_name(name: Option<&str>, location: &str) -> Result<(), SchemaError> {
    match name {
        Some(name)
            if name.contains(|c: char| matches!(c, '.' | '[' | ']' | '*'))
                || name.chars().all(|c| c.is_ascii_digit()) =>
        {
            Err(SchemaError::InvalidName {
                name: name.to_string(),
                location: location.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// `label` falls back to `fallback` unless explicitly `false`
fn resolve_label(label: Option<LabelDef>, fallback: Option<&str>) -> Option<String> {
    match label {
        Some(LabelDef::Text(text)) => Some(text),
        Some(LabelDef::Flag(false)) => None,
        Some(LabelDef::Flag(true)) | None => fallback.map(String::from),
    }
}

fn check_bounds<T: PartialOrd + std::fmt::Display>(
    field: &str,
    (min_key, max_key): (&str, &str),
    min: Option<T>,
    max: Option<T>,
) -> Result<(), SchemaError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(SchemaError::InvalidBounds {
            field: field.to_string(),
            reason: format!("{} {} is greater than {} {}", min_key, min, max_key, max),
        }),
        _ => Ok(()),
    }
}

/// Names visible in one data scope, looking through anonymous containers
fn scope_names<'n>(nodes: &'n [FieldNode], out: &mut Vec<&'n str>) {
    for node in nodes {
        if let Some(name) = node.name() {
            out.push(name);
            continue;
        }
        match node {
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => scope_names(&c.fields, out),
            FieldNode::Tabs(t) => {
                for tab in &t.tabs {
                    match &tab.name {
                        Some(name) => out.push(name),
                        None => scope_names(&tab.fields, out),
                    }
                }
            }
            FieldNode::Leaf(_) | FieldNode::Array(_) => {}
        }
    }
}

fn check_unique_names(nodes: &[FieldNode], chain: &[Ancestor<'_>]) -> Result<(), SchemaError> {
    let mut names = Vec::new();
    scope_names(nodes, &mut names);

    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            let scope = resolve_path(chain);
            return Err(SchemaError::DuplicateName {
                name: name.to_string(),
                scope: if scope.is_root() {
                    "(root)".to_string()
                } else {
                    scope.to_string()
                },
            });
        }
    }
    Ok(())
}

// ============================================================================
// Dependency Resolution
// ============================================================================

/// Template paths of every named node: leaves, named containers, arrays and
/// named tabs
fn named_paths(nodes: &[FieldNode]) -> HashSet<FieldPath> {
    #[derive(Default)]
    struct Named(HashSet<FieldPath>);

    impl<'t> TreeVisitor<'t> for Named {
        fn enter(&mut self, node: &'t FieldNode, scope: &FieldPath) -> bool {
            if let Some(name) = node.name() {
                self.0.insert(scope.push_key(name));
            }
            true
        }

        fn enter_tab(&mut self, tab: &'t Tab, _index: usize, scope: &FieldPath) -> bool {
            if let Some(name) = &tab.name {
                self.0.insert(scope.push_key(name));
            }
            true
        }

        fn leaf(&mut self, _field: &'t LeafField, path: &FieldPath) {
            self.0.insert(path.clone());
        }
    }

    let mut named = Named::default();
    walk_nodes(nodes, &FieldPath::root(), None, &mut named);
    named.0
}

fn resolve_dependencies(nodes: &mut [FieldNode], known: &HashSet<FieldPath>) {
    for_each_leaf_mut(nodes, &mut |leaf: &mut LeafField| {
        if let Some(names) = &leaf.dependencies {
            let resolved = names
                .iter()
                .map(|name| resolve_dependency(name, &leaf.template_path, known))
                .collect();
            leaf.resolved_dependencies = Some(resolved);
        }
    });
}

/// Look `name` up from the innermost scope of `from` outwards. Dotted names
/// are absolute paths.
fn resolve_dependency(name: &str, from: &FieldPath, known: &HashSet<FieldPath>) -> DependencyRef {
    if name.contains('.') || name.contains('[') {
        let path = FieldPath::parse(name);
        return if known.contains(&path.template()) {
            DependencyRef::Resolved(path)
        } else {
            DependencyRef::Unresolved(name.to_string())
        };
    }

    let mut scope = from.parent();
    loop {
        let candidate = scope.push_key(name);
        if known.contains(&candidate) {
            return DependencyRef::Resolved(candidate);
        }
        if scope.is_root() {
            return DependencyRef::Unresolved(name.to_string());
        }
        scope = scope.parent();
    }
}

fn for_each_leaf_mut<F: FnMut(&mut LeafField)>(nodes: &mut [FieldNode], f: &mut F) {
    for node in nodes {
        match node {
            FieldNode::Leaf(leaf) => f(leaf),
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => for_each_leaf_mut(&mut c.fields, f),
            FieldNode::Tabs(t) => {
                for tab in &mut t.tabs {
                    for_each_leaf_mut(&mut tab.fields, f);
                }
            }
            FieldNode::Array(a) => for_each_leaf_mut(&mut a.fields, f),
        }
    }
}
