//! Renderer contract
//!
//! A renderer walks the visible part of a form through a [`FormAdapter`] and
//! receives one [`FieldView`] per leaf with everything needed to draw it.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

use super::FormAdapter;
use crate::domain::field::{ArrayContainer, FieldKind, FieldNode, LeafField, OptionEntry, Tab};
use crate::domain::path::{self, FieldPath};
use crate::domain::tree::{FormTree, TreeVisitor};

/// Everything a widget needs for one concrete field
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub path: String,
    pub kind: FieldKind,
    pub label: Option<String>,
    pub description: Option<String>,
    pub value: Value,
    pub errors: Vec<String>,
    pub hidden: bool,
    pub disabled: bool,
    pub read_only: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionEntry>>,
    pub options_loading: bool,
}

impl FieldView {
    /// Resolve the view of `field` at concrete `path`
    pub fn resolve(field: &LeafField, path: &FieldPath, adapter: &dyn FormAdapter) -> Self {
        let key = path.to_string();
        let value = adapter.watch(&key);
        let errors = adapter.errors_for(&key);

        let (hidden, disabled, read_only, options, options_loading) = match adapter.field_state(&key) {
            Some(state) => (
                state.hidden,
                state.disabled,
                state.read_only,
                state.options,
                state.options_loading,
            ),
            None => {
                // Path not derived yet (e.g. a row appended since the last read)
                let values = adapter.get_values();
                let sibling = path::sibling_data(&values, path);
                let shown = field
                    .condition
                    .as_ref()
                    .map_or(true, |condition| condition.evaluate(&values, sibling));
                (
                    field.hidden.evaluate(&values, sibling) || !shown,
                    field.disabled.evaluate(&values, sibling),
                    field.read_only.evaluate(&values, sibling),
                    None,
                    false,
                )
            }
        };

        Self {
            path: key,
            kind: field.kind,
            label: field.label.clone(),
            description: field.description.clone(),
            value,
            errors,
            hidden,
            disabled,
            read_only,
            required: field.required,
            options,
            options_loading,
        }
    }
}

/// Receives the visible structure of a form in document order
pub trait FieldRenderer {
    /// `path` is the container's own data path when it is named
    fn begin_container(&mut self, _node: &FieldNode, _path: Option<&FieldPath>) {}

    fn end_container(&mut self, _node: &FieldNode) {}

    fn begin_tab(&mut self, _tab: &Tab, _active: bool) {}

    fn end_tab(&mut self, _tab: &Tab) {}

    fn begin_row(&mut self, _array: &ArrayContainer, _row: &FieldPath) {}

    fn end_row(&mut self, _array: &ArrayContainer, _row: &FieldPath) {}

    fn field(&mut self, view: FieldView);
}

/// Walk every visible field of `tree` against the adapter's current values
pub fn render_form<R: FieldRenderer + ?Sized>(tree: &FormTree, adapter: &dyn FormAdapter, renderer: &mut R) {
    let values = adapter.get_values();
    let mut walk = RenderWalk {
        adapter,
        renderer,
        values: &values,
        opened: Vec::new(),
        active_tabs: Vec::new(),
    };
    tree.walk(&values, &mut walk);
}

struct RenderWalk<'a, 'v, R: ?Sized> {
    adapter: &'a dyn FormAdapter,
    renderer: &'a mut R,
    values: &'v Value,
    /// Whether each entered container was rendered
    opened: Vec<bool>,
    /// Active tab index of each rendered tabs container
    active_tabs: Vec<usize>,
}

impl<'t, R: FieldRenderer + ?Sized> TreeVisitor<'t> for RenderWalk<'_, '_, R> {
    fn enter(&mut self, node: &'t FieldNode, scope: &FieldPath) -> bool {
        let sibling = path::scope_data(self.values, scope);
        if node.hidden().evaluate(self.values, sibling) {
            self.opened.push(false);
            return false;
        }

        if let FieldNode::Tabs(tabs) = node {
            let wanted = tabs.default_tab.evaluate(self.values, sibling);
            let active = wanted
                .and_then(|wanted| {
                    tabs.tabs
                        .iter()
                        .position(|tab| tab.name.as_deref() == Some(wanted.as_str()) || tab.label == wanted)
                })
                .unwrap_or(0);
            self.active_tabs.push(active);
        }

        let own_path = node.name().map(|name| scope.push_key(name));
        self.renderer.begin_container(node, own_path.as_ref());
        self.opened.push(true);
        true
    }

    fn leave(&mut self, node: &'t FieldNode, _scope: &FieldPath) {
        if self.opened.pop().unwrap_or(false) {
            if let FieldNode::Tabs(_) = node {
                self.active_tabs.pop();
            }
            self.renderer.end_container(node);
        }
    }

    fn enter_tab(&mut self, tab: &'t Tab, index: usize, _scope: &FieldPath) -> bool {
        let active = self.active_tabs.last().copied() == Some(index);
        self.renderer.begin_tab(tab, active);
        true
    }

    fn leave_tab(&mut self, tab: &'t Tab, _index: usize, _scope: &FieldPath) {
        self.renderer.end_tab(tab);
    }

    fn enter_row(&mut self, array: &'t ArrayContainer, row: &FieldPath) {
        self.renderer.begin_row(array, row);
    }

    fn leave_row(&mut self, array: &'t ArrayContainer, row: &FieldPath) {
        self.renderer.end_row(array, row);
    }

    fn leaf(&mut self, field: &'t LeafField, path: &FieldPath) {
        let view = FieldView::resolve(field, path, self.adapter);
        if !view.hidden {
            self.renderer.field(view);
        }
    }
}

// ============================================================================
// Outline Renderer
// ============================================================================

/// Plain-text outline of a form, one line per container, tab, row and field
#[derive(Debug, Default)]
pub struct OutlineRenderer {
    out: String,
    depth: usize,
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}{}", "  ".repeat(self.depth), text);
    }
}

impl FieldRenderer for OutlineRenderer {
    fn begin_container(&mut self, node: &FieldNode, path: Option<&FieldPath>) {
        let label = match node {
            FieldNode::Row(c) | FieldNode::Group(c) | FieldNode::Collapsible(c) => c.label.as_deref(),
            FieldNode::Array(a) => a.label.as_deref(),
            _ => None,
        };
        let mut text = node.type_name().to_string();
        if let Some(path) = path {
            let _ = write!(text, " {}", path);
        }
        if let Some(label) = label {
            let _ = write!(text, " \"{}\"", label);
        }
        self.line(&text);
        self.depth += 1;
    }

    fn end_container(&mut self, _node: &FieldNode) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn begin_tab(&mut self, tab: &Tab, active: bool) {
        let marker = if active { " (active)" } else { "" };
        self.line(&format!("tab \"{}\"{}", tab.label, marker));
        self.depth += 1;
    }

    fn end_tab(&mut self, _tab: &Tab) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn begin_row(&mut self, _array: &ArrayContainer, row: &FieldPath) {
        self.line(&format!("row {}", row));
        self.depth += 1;
    }

    fn end_row(&mut self, _array: &ArrayContainer, _row: &FieldPath) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn field(&mut self, view: FieldView) {
        let mut text = format!("{} ({}) = {}", view.path, view.kind, view.value);
        if view.required {
            text.push_str(" required");
        }
        if view.disabled {
            text.push_str(" disabled");
        }
        if view.read_only {
            text.push_str(" read-only");
        }
        if view.options_loading {
            text.push_str(" options=loading");
        } else if let Some(options) = &view.options {
            let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
            let _ = write!(text, " options=[{}]", labels.join(", "));
        }
        self.line(&text);
        for error in &view.errors {
            self.line(&format!("  ! {}", error));
        }
    }
}
