//! Form engine: dependency recomputation, validation and the state store

pub mod dependency;
pub mod rules;
pub mod store;
pub mod validation;


pub use dependency::{DependencyEngine, DerivedState, FetchRequest, FieldState};
pub use store::{
    FormState, FormStore, FormStoreBuilder, FormSubmit, PathWatcher, SetValueOptions, SubmitEvent,
    SubmitHandler, SubmitOutcome, ValidationMode,
};
pub use validation::{FnResolver, Resolver, ValidationEngine};
