use super::render::{render_form, FieldRenderer, FieldView, OutlineRenderer};
use super::FormAdapter;
use crate::domain::definition::{FieldDef, TabDef};
use crate::domain::field::{FieldKind, FieldNode, OptionEntry, Tab};
use crate::domain::path::FieldPath;
use crate::domain::tree::FormTree;
use crate::domain::error::{PathError, SubmissionError};
use crate::engine::dependency::FieldState;
use crate::engine::store::{FormState, FormStore, FormSubmit, SetValueOptions, SubmitEvent, SubmitOutcome};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    views: Vec<FieldView>,
}

impl FieldRenderer for Recorder {
    fn begin_container(&mut self, node: &FieldNode, path: Option<&FieldPath>) {
        let path = path.map(|p| p.to_string()).unwrap_or_default();
        self.events.push(format!("begin {} {}", node.type_name(), path));
    }

    fn end_container(&mut self, node: &FieldNode) {
        self.events.push(format!("end {}", node.type_name()));
    }

    fn begin_tab(&mut self, tab: &Tab, active: bool) {
        self.events.push(format!("tab {} {}", tab.label, active));
    }

    fn field(&mut self, view: FieldView) {
        self.events.push(format!("field {}", view.path));
        self.views.push(view);
    }
}

fn profile_tree() -> Arc<FormTree> {
    Arc::new(
        FormTree::from_defs(vec![
            FieldDef::row(vec![FieldDef::text("first").required(true), FieldDef::text("last")]),
            FieldDef::checkbox("hasCompany"),
            FieldDef::group(vec![FieldDef::text("company")])
                .named("work")
                .hidden_when(|data, _| data["hasCompany"] != true),
            FieldDef::tabs(vec![
                TabDef::new("Home", vec![FieldDef::text("street")]).named("home"),
                TabDef::new("Billing", vec![FieldDef::text("card")]).named("billing"),
            ])
            .default_tab("billing"),
            FieldDef::select("plan")
                .options(vec![OptionEntry::new("Free", "free"), OptionEntry::new("Pro", "pro")])
                .disabled_when(|data, _| data["first"].is_null()),
        ])
        .unwrap(),
    )
}

#[tokio::test]
async fn test_render_skips_hidden_containers() {
    let tree = profile_tree();
    let store = FormStore::builder(Arc::clone(&tree)).build();

    let mut recorder = Recorder::default();
    render_form(&tree, &store, &mut recorder);

    assert!(!recorder.events.iter().any(|e| e.contains("work")));
    assert!(recorder.events.contains(&"begin row ".to_string()));
    assert!(recorder.events.contains(&"tab Billing true".to_string()));
    assert!(recorder.events.contains(&"tab Home false".to_string()));

    store.set_value("hasCompany", json!(true), SetValueOptions::default()).unwrap();
    let mut recorder = Recorder::default();
    render_form(&tree, &store, &mut recorder);
    assert!(recorder.events.contains(&"begin group work".to_string()));
    assert!(recorder.events.contains(&"field work.company".to_string()));
}

#[tokio::test]
async fn test_field_view_resolves_state_errors_and_options() {
    let tree = profile_tree();
    let store = FormStore::builder(Arc::clone(&tree)).build();

    let plan = tree.leaf(&FieldPath::parse("plan")).unwrap();
    let view = FieldView::resolve(plan, &FieldPath::parse("plan"), &store);
    assert_eq!(view.kind, FieldKind::Select);
    assert!(view.disabled);
    assert_eq!(view.options.as_ref().map(Vec::len), Some(2));
    assert_eq!(view.label.as_deref(), Some("plan"));

    store.set_value("first", json!(""), SetValueOptions::default()).unwrap();
    store.settle().await;

    let first = tree.leaf(&FieldPath::parse("first")).unwrap();
    let view = FieldView::resolve(first, &FieldPath::parse("first"), &store);
    assert!(view.required);
    assert_eq!(view.value, json!(""));
    assert_eq!(view.errors.len(), 1);

    let view = FieldView::resolve(plan, &FieldPath::parse("plan"), &store);
    assert!(!view.disabled);
}

#[tokio::test]
async fn test_outline_renderer_lists_rows_and_errors() {
    let tree = Arc::new(
        FormTree::from_defs(vec![FieldDef::array(
            "contacts",
            vec![FieldDef::email("email").required(true)],
        )
        .label("Contacts")])
        .unwrap(),
    );
    let store = FormStore::builder(Arc::clone(&tree))
        .default_values(json!({ "contacts": [{ "email": "nope" }] }))
        .build();
    store.handle_submit(&mut FormSubmit::default()).await.unwrap();

    let mut outline = OutlineRenderer::new();
    render_form(&tree, &store, &mut outline);
    let text = outline.finish();

    assert_eq!(
        text,
        "array contacts \"Contacts\"\n  row contacts.0\n    contacts.0.email (email) = \"nope\" required\n      ! Enter a valid email address\n"
    );
}

#[tokio::test]
async fn test_store_through_adapter_object() {
    let tree = profile_tree();
    let store = FormStore::builder(tree).on_submit(|_| async { Ok(()) }).build();
    let adapter: &dyn FormAdapter = &store;

    adapter.set_value("first", json!("Ada"), SetValueOptions::default()).unwrap();
    assert_eq!(adapter.watch("first"), json!("Ada"));
    assert_eq!(adapter.get_values()["first"], json!("Ada"));
    assert!(adapter.form_state().is_dirty);

    let outcome = adapter.handle_submit(&mut FormSubmit::default()).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted));
    assert_eq!(adapter.form_state().submit_count, 1);

    adapter.reset(None);
    assert_eq!(adapter.watch("first"), json!(null));
    assert!(!adapter.form_state().is_dirty);
}

/// Delegates to a store and counts full state snapshots
struct CountingAdapter {
    store: FormStore,
    snapshots: AtomicUsize,
}

#[async_trait]
impl FormAdapter for CountingAdapter {
    fn watch(&self, path: &str) -> Value {
        self.store.watch(path)
    }

    fn set_value(&self, path: &str, value: Value, options: SetValueOptions) -> Result<(), PathError> {
        self.store.set_value(path, value, options)
    }

    fn get_values(&self) -> Arc<Value> {
        self.store.get_values()
    }

    fn form_state(&self) -> FormState {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.store.form_state()
    }

    fn errors_for(&self, path: &str) -> Vec<String> {
        self.store.errors_for(path)
    }

    fn field_state(&self, path: &str) -> Option<FieldState> {
        self.store.field_state(path)
    }

    fn on_blur(&self, path: &str) {
        self.store.on_blur(path)
    }

    fn reset(&self, values: Option<Value>) {
        self.store.reset(values)
    }

    async fn handle_submit(&self, event: &mut dyn SubmitEvent) -> Result<SubmitOutcome, SubmissionError> {
        self.store.handle_submit(event).await
    }
}

#[tokio::test]
async fn test_render_reads_errors_per_path() {
    let tree = profile_tree();
    let adapter = CountingAdapter {
        store: FormStore::builder(Arc::clone(&tree)).build(),
        snapshots: AtomicUsize::new(0),
    };
    adapter.handle_submit(&mut FormSubmit::default()).await.unwrap();

    let mut recorder = Recorder::default();
    render_form(&tree, &adapter, &mut recorder);

    let first = recorder.views.iter().find(|v| v.path == "first").unwrap();
    assert_eq!(first.errors, vec!["first is required"]);
    assert_eq!(adapter.snapshots.load(Ordering::SeqCst), 0);
}
