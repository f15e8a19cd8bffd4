//! Form State Store
//!
//! The single owner of Form Values and the Error Map. Edits are applied
//! synchronously; dependency recomputation and validation are deferred to
//! `flush()` (or a driver task running it) and always operate on the latest
//! snapshot, so bursts of edits coalesce into one pass.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::dependency::{DependencyEngine, DerivedState, FetchRequest, FieldState};
use super::validation::{Resolver, ValidationEngine};
use crate::domain::error::{ErrorMap, PathError, SubmissionError};
use crate::domain::path::{self, FieldPath};
use crate::domain::tree::{row_defaults, FormTree};

// ============================================================================
// Modes and Options
// ============================================================================

/// When field errors are revealed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    #[default]
    #[serde(alias = "on_change")]
    OnChange,
    #[serde(alias = "on_blur")]
    OnBlur,
    #[serde(alias = "on_submit")]
    OnSubmit,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(|c: char| c == '_' || c == '-', "").as_str() {
            "onchange" | "change" => Ok(ValidationMode::OnChange),
            "onblur" | "blur" => Ok(ValidationMode::OnBlur),
            "onsubmit" | "submit" => Ok(ValidationMode::OnSubmit),
            _ => Err(format!(
                "invalid validation mode '{}', expected onChange, onBlur or onSubmit",
                s
            )),
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationMode::OnChange => "onChange",
            ValidationMode::OnBlur => "onBlur",
            ValidationMode::OnSubmit => "onSubmit",
        })
    }
}

/// Options for `FormStore::set_value`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Count the edit towards revealing errors for this path
    pub should_validate: bool,
    /// Mark the form dirty
    pub should_dirty: bool,
}

impl Default for SetValueOptions {
    fn default() -> Self {
        Self {
            should_validate: true,
            should_dirty: true,
        }
    }
}

impl SetValueOptions {
    /// Write without dirtying the form or revealing errors
    pub fn silent() -> Self {
        Self {
            should_validate: false,
            should_dirty: false,
        }
    }
}

/// Snapshot of the store's observable state
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub values: Value,
    pub errors: ErrorMap,
    pub is_dirty: bool,
    pub is_submitting: bool,
    pub is_valid: bool,
    /// An option fetch is in flight
    pub is_loading: bool,
    pub is_validating: bool,
    pub is_submitted: bool,
    pub is_submit_successful: bool,
    pub submit_count: u32,
    pub dirty_fields: BTreeSet<String>,
    pub touched_fields: BTreeSet<String>,
}

/// A host submit event; the store prevents its default action
pub trait SubmitEvent: Send {
    fn prevent_default(&mut self);
}

/// A submit event carrying only the prevented flag
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormSubmit {
    pub default_prevented: bool,
}

impl SubmitEvent for FormSubmit {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// What `handle_submit` did
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Validation passed and the handler (if any) completed
    Submitted,
    /// Validation failed; the handler was not called
    Invalid(ErrorMap),
    /// Another submission was already in flight
    Ignored,
}

impl SubmitOutcome {
    /// First invalid path, the one a renderer should focus
    pub fn focus_path(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Invalid(errors) => errors.paths().next(),
            _ => None,
        }
    }
}

pub type SubmitHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

// ============================================================================
// Builder
// ============================================================================

pub struct FormStoreBuilder {
    tree: Arc<FormTree>,
    default_values: Value,
    mode: ValidationMode,
    revalidate_mode: ValidationMode,
    resolver: Option<Arc<dyn Resolver>>,
    on_submit: Option<SubmitHandler>,
}

impl FormStoreBuilder {
    /// Host-supplied defaults; field `defaultValue`s fill in what is missing
    pub fn default_values(mut self, values: Value) -> Self {
        self.default_values = values;
        self
    }

    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mode in effect after the first submit attempt
    pub fn revalidate_mode(mut self, mode: ValidationMode) -> Self {
        self.revalidate_mode = mode;
        self
    }

    /// Replace the schema-derived resolver
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_submit = Some(Arc::new(move |values| handler(values).boxed()));
        self
    }

    pub fn build(self) -> FormStore {
        let tree = self.tree;
        let defaults = Arc::new(tree.seed(self.default_values));
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ValidationEngine::new(Arc::clone(&tree))));
        let (values_tx, _) = watch::channel(Arc::clone(&defaults));

        let state = StoreState {
            values: Arc::clone(&defaults),
            defaults,
            revision: 0,
            planned_revision: None,
            options_epoch: 0,
            derived_cache: None,
            errors: ErrorMap::new(),
            is_valid: false,
            is_dirty: false,
            dirty_fields: BTreeSet::new(),
            edited: BTreeSet::new(),
            blurred: BTreeSet::new(),
            submit_count: 0,
            is_submitting: false,
            is_submit_successful: false,
            pending: Some(PendingPass::default()),
            validation_generation: 0,
            validating: false,
        };

        tracing::debug!("Built form store (mode {}, revalidate {})", self.mode, self.revalidate_mode);
        FormStore {
            inner: Arc::new(Inner {
                dependency: Mutex::new(DependencyEngine::new(Arc::clone(&tree))),
                tree,
                resolver,
                on_submit: self.on_submit,
                mode: self.mode,
                revalidate_mode: self.revalidate_mode,
                state: Mutex::new(state),
                notify: Arc::new(Notify::new()),
                values_tx,
                inflight: Mutex::new(Vec::new()),
            }),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Which triggers a queued pass accumulated
#[derive(Clone, Copy, Debug, Default)]
struct PendingPass {
    change: bool,
    blur: bool,
}

struct StoreState {
    values: Arc<Value>,
    defaults: Arc<Value>,
    revision: u64,
    planned_revision: Option<u64>,
    options_epoch: u64,
    derived_cache: Option<(u64, u64, Arc<DerivedState>)>,
    errors: ErrorMap,
    is_valid: bool,
    is_dirty: bool,
    dirty_fields: BTreeSet<String>,
    edited: BTreeSet<String>,
    blurred: BTreeSet<String>,
    submit_count: u32,
    is_submitting: bool,
    is_submit_successful: bool,
    pending: Option<PendingPass>,
    validation_generation: u64,
    validating: bool,
}

impl StoreState {
    fn cached_derived(&self, revision: u64) -> Option<Arc<DerivedState>> {
        match &self.derived_cache {
            Some((cached, epoch, derived)) if *cached == revision && *epoch == self.options_epoch => {
                Some(Arc::clone(derived))
            }
            _ => None,
        }
    }

    fn request_pass(&mut self, change: bool, blur: bool) {
        let pending = self.pending.get_or_insert_with(PendingPass::default);
        pending.change |= change;
        pending.blur |= blur;
    }

    fn is_revealed(&self, path: &str, mode: ValidationMode) -> bool {
        if self.submit_count > 0 {
            return true;
        }
        match mode {
            ValidationMode::OnChange => self.edited.contains(path),
            ValidationMode::OnBlur => self.blurred.contains(path),
            ValidationMode::OnSubmit => false,
        }
    }
}

struct Inner {
    tree: Arc<FormTree>,
    /// Locked on its own so host predicates never run under `state`.
    /// Lock order: `state` before `dependency`.
    dependency: Mutex<DependencyEngine>,
    resolver: Arc<dyn Resolver>,
    on_submit: Option<SubmitHandler>,
    mode: ValidationMode,
    revalidate_mode: ValidationMode,
    state: Mutex<StoreState>,
    notify: Arc<Notify>,
    values_tx: watch::Sender<Arc<Value>>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dependency(&self) -> MutexGuard<'_, DependencyEngine> {
        self.dependency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_mode(&self, state: &StoreState) -> ValidationMode {
        if state.submit_count > 0 {
            self.revalidate_mode
        } else {
            self.mode
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Wake a driver so it can observe that the store is gone
        self.notify.notify_one();
    }
}

struct PassJob {
    generation: u64,
    pending: PendingPass,
    values: Arc<Value>,
    derived: Arc<DerivedState>,
}

/// Resets `isSubmitting` however the submission ends
struct SubmitGuard<'a>(&'a Inner);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().is_submitting = false;
    }
}

/// Handle to a form's state; clones share the same form
#[derive(Clone)]
pub struct FormStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for FormStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStore")
            .field("mode", &self.inner.mode)
            .field("revalidate_mode", &self.inner.revalidate_mode)
            .finish_non_exhaustive()
    }
}

impl FormStore {
    pub fn builder(tree: impl Into<Arc<FormTree>>) -> FormStoreBuilder {
        FormStoreBuilder {
            tree: tree.into(),
            default_values: Value::Object(Map::new()),
            mode: ValidationMode::default(),
            revalidate_mode: ValidationMode::OnChange,
            resolver: None,
            on_submit: None,
        }
    }

    pub fn tree(&self) -> &Arc<FormTree> {
        &self.inner.tree
    }

    pub fn mode(&self) -> ValidationMode {
        self.inner.mode
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read-only snapshot of Form Values
    pub fn get_values(&self) -> Arc<Value> {
        Arc::clone(&self.inner.lock().values)
    }

    /// Current value at `path`; missing paths read as null
    pub fn watch(&self, path: &str) -> Value {
        let state = self.inner.lock();
        path::get(&state.values, &FieldPath::parse(path))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Subscribe to changes of a single path
    pub fn subscribe(&self, path: &str) -> PathWatcher {
        let path = FieldPath::parse(path);
        let rx = self.inner.values_tx.subscribe();
        let last = path::get(&rx.borrow(), &path).cloned().unwrap_or(Value::Null);
        PathWatcher { path, rx, last }
    }

    pub fn form_state(&self) -> FormState {
        let is_loading = self.inner.dependency().is_loading();
        let state = self.inner.lock();
        FormState {
            values: (*state.values).clone(),
            errors: state.errors.clone(),
            is_dirty: state.is_dirty,
            is_submitting: state.is_submitting,
            is_valid: state.is_valid,
            is_loading,
            is_validating: state.validating,
            is_submitted: state.submit_count > 0,
            is_submit_successful: state.is_submit_successful,
            submit_count: state.submit_count,
            dirty_fields: state.dirty_fields.clone(),
            touched_fields: state.blurred.clone(),
        }
    }

    /// Derived state for the current values, recomputed on demand.
    /// Computed attributes may read values back through `watch` or
    /// `get_values`; any other store call from inside them deadlocks.
    pub fn derived_state(&self) -> Arc<DerivedState> {
        let (revision, values) = {
            let state = self.inner.lock();
            (state.revision, Arc::clone(&state.values))
        };
        self.derive_snapshot(revision, &values)
    }

    /// Derived state of the snapshot taken at `revision`
    fn derive_snapshot(&self, revision: u64, values: &Arc<Value>) -> Arc<DerivedState> {
        let epoch = {
            let state = self.inner.lock();
            if let Some(derived) = state.cached_derived(revision) {
                return derived;
            }
            state.options_epoch
        };

        let derived = Arc::new(self.inner.dependency().derive(values));

        let mut state = self.inner.lock();
        if state.revision == revision {
            state.derived_cache = Some((revision, epoch, Arc::clone(&derived)));
        }
        derived
    }

    /// Computed state of one field; `None` for paths not in the form
    pub fn field_state(&self, path: &str) -> Option<FieldState> {
        self.derived_state().field(path).cloned()
    }

    /// Errors currently shown for `path`
    pub fn errors_for(&self, path: &str) -> Vec<String> {
        self.inner.lock().errors.messages(path)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write `value` at `path` and queue a recompute
    pub fn set_value(&self, path: &str, value: Value, options: SetValueOptions) -> Result<(), PathError> {
        let path = FieldPath::parse(path);
        self.mutate(&path, options, |values| path::set(values, &path, value))
    }

    /// Append a row to the array at `path`; `None` uses the row template's
    /// defaults
    pub fn append_row(&self, path: &str, row: Option<Value>) -> Result<(), PathError> {
        let path = FieldPath::parse(path);
        let row = row.unwrap_or_else(|| {
            self.inner
                .tree
                .array(&path.template())
                .map(row_defaults)
                .unwrap_or_else(|| Value::Object(Map::new()))
        });

        self.mutate(&path, SetValueOptions::default(), |values| {
            let mut rows = path::get(values, &path)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            rows.push(row);
            path::set(values, &path, Value::Array(rows))
        })
    }

    /// Remove row `index` of the array at `path`; out of range is a no-op
    pub fn remove_row(&self, path: &str, index: usize) -> Result<(), PathError> {
        let path = FieldPath::parse(path);
        self.mutate(&path, SetValueOptions::default(), |values| {
            let mut rows = match path::get(values, &path).and_then(Value::as_array) {
                Some(rows) if index < rows.len() => rows.clone(),
                _ => return Ok(()),
            };
            rows.remove(index);
            path::set(values, &path, Value::Array(rows))
        })
    }

    fn mutate<F>(&self, path: &FieldPath, options: SetValueOptions, apply: F) -> Result<(), PathError>
    where
        F: FnOnce(&mut Value) -> Result<(), PathError>,
    {
        let snapshot = {
            let mut state = self.inner.lock();
            let mut next = (*state.values).clone();
            apply(&mut next)?;
            if next == *state.values {
                return Ok(());
            }

            let key = path.to_string();
            if options.should_dirty {
                state.is_dirty = true;
                state.dirty_fields.insert(key.clone());
            }
            if options.should_validate {
                state.edited.insert(key);
            }
            state.values = Arc::new(next);
            state.revision += 1;
            state.request_pass(options.should_validate, false);
            Arc::clone(&state.values)
        };

        self.inner.values_tx.send_replace(snapshot);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Mark `path` as having lost focus
    pub fn on_blur(&self, path: &str) {
        {
            let mut state = self.inner.lock();
            state.blurred.insert(FieldPath::parse(path).to_string());
            state.request_pass(false, true);
        }
        self.inner.notify.notify_one();
    }

    /// Restore the given snapshot, or the seeded defaults, and clear errors,
    /// dirty state and submission bookkeeping
    pub fn reset(&self, values: Option<Value>) {
        let snapshot = {
            let mut state = self.inner.lock();
            let next = match values {
                Some(values) => Arc::new(values),
                None => Arc::clone(&state.defaults),
            };
            state.values = next;
            state.errors = ErrorMap::new();
            state.is_dirty = false;
            state.dirty_fields.clear();
            state.edited.clear();
            state.blurred.clear();
            state.submit_count = 0;
            state.is_submit_successful = false;
            state.revision += 1;
            state.validation_generation += 1;
            state.validating = false;
            state.pending = Some(PendingPass::default());
            Arc::clone(&state.values)
        };

        tracing::debug!("Form reset");
        self.inner.values_tx.send_replace(snapshot);
        self.inner.notify.notify_one();
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Run the queued recompute against the latest snapshot: plan option
    /// fetches, then validate. Repeats while edits keep arriving.
    pub async fn flush(&self) {
        while let Some(job) = self.prepare_pass() {
            tracing::debug!("Running validation pass {}", job.generation);
            let errors = self
                .inner
                .resolver
                .resolve(Arc::clone(&job.values), Arc::clone(&job.derived))
                .await;
            self.apply_pass(job, errors);
        }
    }

    /// Flush, then wait for every in-flight option fetch
    pub async fn settle(&self) {
        loop {
            self.flush().await;

            let handles: Vec<JoinHandle<()>> = {
                let mut inflight = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *inflight)
            };
            if handles.is_empty() {
                if self.inner.lock().pending.is_none() {
                    break;
                }
                continue;
            }

            for result in join_all(handles).await {
                if let Err(e) = result {
                    tracing::warn!("Option fetch task failed: {}", e);
                }
            }
        }
    }

    /// Run `flush` whenever the store changes, until every handle is dropped
    pub fn spawn_driver(&self) -> JoinHandle<()> {
        let notify = Arc::clone(&self.inner.notify);
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                notify.notified().await;
                let store = match weak.upgrade() {
                    Some(inner) => FormStore { inner },
                    None => break,
                };
                store.flush().await;
            }
            tracing::debug!("Form store driver stopped");
        })
    }

    fn prepare_pass(&self) -> Option<PassJob> {
        let (pending, revision, values) = {
            let mut state = self.inner.lock();
            let pending = state.pending.take()?;
            (pending, state.revision, Arc::clone(&state.values))
        };
        let derived = self.derive_snapshot(revision, &values);

        let (job, requests) = {
            let mut state = self.inner.lock();
            let mut requests = Vec::new();
            if state.planned_revision != Some(revision) {
                state.planned_revision = Some(revision);
                requests = self.inner.dependency().plan_fetches(&values);
                if !requests.is_empty() {
                    state.options_epoch += 1;
                }
            }

            state.validation_generation += 1;
            state.validating = true;
            let job = PassJob {
                generation: state.validation_generation,
                pending,
                values,
                derived,
            };
            (job, requests)
        };

        self.spawn_fetches(requests);
        Some(job)
    }

    fn apply_pass(&self, job: PassJob, full: ErrorMap) {
        let mut state = self.inner.lock();
        if job.generation != state.validation_generation {
            tracing::debug!("Discarding stale validation pass {}", job.generation);
            return;
        }

        state.validating = false;
        state.is_valid = full.is_empty();

        let mode = self.inner.active_mode(&state);
        let rebuild = match mode {
            ValidationMode::OnChange => job.pending.change,
            ValidationMode::OnBlur => job.pending.blur,
            ValidationMode::OnSubmit => false,
        };

        let derived = &job.derived;
        let errors = if rebuild {
            full.filtered(|path| !derived.is_hidden(path) && state.is_revealed(path, mode))
        } else {
            state
                .errors
                .filtered(|path| !derived.is_hidden(path) && (derived.field(path).is_some() || full.contains(path)))
        };
        state.errors = errors;
    }

    fn spawn_fetches(&self, requests: Vec<FetchRequest>) {
        if requests.is_empty() {
            return;
        }

        let mut inflight = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        inflight.retain(|handle| !handle.is_finished());

        for request in requests {
            let weak = Arc::downgrade(&self.inner);
            inflight.push(tokio::spawn(async move {
                let FetchRequest {
                    path,
                    token,
                    loader,
                    context,
                } = request;

                let result = match AssertUnwindSafe(async move { loader(context).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("option loader panicked")),
                };

                if let Some(inner) = weak.upgrade() {
                    let applied = inner.dependency().complete_fetch(&path, token, result);
                    if applied {
                        inner.lock().options_epoch += 1;
                    }
                }
            }));
        }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Prevent the event's default, validate the whole form and, when valid,
    /// run the submit handler with `isSubmitting` set for its duration.
    /// A submission already in flight makes this a no-op.
    pub async fn handle_submit(&self, event: &mut dyn SubmitEvent) -> Result<SubmitOutcome, SubmissionError> {
        event.prevent_default();

        let (generation, revision, values) = {
            let mut state = self.inner.lock();
            if state.is_submitting {
                tracing::debug!("Submission already in flight, ignoring");
                return Ok(SubmitOutcome::Ignored);
            }
            state.is_submitting = true;
            state.submit_count += 1;
            state.validation_generation += 1;
            state.validating = true;
            (state.validation_generation, state.revision, Arc::clone(&state.values))
        };
        let _guard = SubmitGuard(&self.inner);

        let job = PassJob {
            generation,
            pending: PendingPass::default(),
            derived: self.derive_snapshot(revision, &values),
            values,
        };

        let full = self
            .inner
            .resolver
            .resolve(Arc::clone(&job.values), Arc::clone(&job.derived))
            .await;
        let full = full.filtered(|path| !job.derived.is_hidden(path));

        {
            let mut state = self.inner.lock();
            if job.generation == state.validation_generation {
                state.validating = false;
                state.is_valid = full.is_empty();
                state.errors = full.clone();
            }
            if !full.is_empty() {
                state.is_submit_successful = false;
            }
        }

        if !full.is_empty() {
            tracing::debug!("Submission blocked by {} invalid fields", full.len());
            return Ok(SubmitOutcome::Invalid(full));
        }

        let handler = match &self.inner.on_submit {
            Some(handler) => Arc::clone(handler),
            None => {
                self.inner.lock().is_submit_successful = true;
                return Ok(SubmitOutcome::Submitted);
            }
        };

        let values = (*job.values).clone();
        let outcome = match AssertUnwindSafe(async move { handler(values).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(SubmitOutcome::Submitted),
            Ok(Err(e)) => {
                tracing::error!("Submit handler failed: {}", e);
                Err(SubmissionError::Handler(e))
            }
            Err(_) => {
                tracing::error!("Submit handler panicked");
                Err(SubmissionError::Panicked)
            }
        };

        self.inner.lock().is_submit_successful = outcome.is_ok();
        outcome
    }
}

// ============================================================================
// Path Watcher
// ============================================================================

/// Resolves each time the value at one path changes
pub struct PathWatcher {
    path: FieldPath,
    rx: watch::Receiver<Arc<Value>>,
    last: Value,
}

impl PathWatcher {
    /// Value seen by the last `changed` (or at subscription)
    pub fn current(&self) -> &Value {
        &self.last
    }

    /// Wait for the next change of the watched value. `None` once the store
    /// is gone.
    pub async fn changed(&mut self) -> Option<Value> {
        loop {
            self.rx.changed().await.ok()?;
            let next = path::get(&self.rx.borrow_and_update(), &self.path)
                .cloned()
                .unwrap_or(Value::Null);
            if next != self.last {
                self.last = next.clone();
                return Some(next);
            }
        }
    }
}
