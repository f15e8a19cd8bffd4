//! Form domain: the field tree, paths into form values and the error taxonomy

pub mod condition;
pub mod definition;
pub mod error;
pub mod field;
pub mod path;
pub mod tree;


pub use condition::Condition;
pub use definition::{FieldDef, LabelDef, TabDef};
pub use error::{DependencyError, ErrorMap, PathError, Rule, SchemaError, SubmissionError, ValidationError};
pub use field::{
    ArrayContainer, Constraints, Container, CustomValidator, DependencyRef, Dynamic, FieldKind, FieldNode,
    FieldStyle, LeafField, OptionContext, OptionEntry, OptionSource, Tab, TabsContainer, ValidationContext,
    Verdict,
};
pub use path::{Ancestor, FieldPath, PathSegment};
pub use tree::{FormTree, TreeVisitor};
