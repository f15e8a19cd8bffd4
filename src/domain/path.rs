//! Path resolution between field positions and Form Values
//!
//! A field's path is derived from its ancestry: named containers and fields
//! contribute a key, array rows contribute their index, and anonymous layout
//! containers contribute nothing.

use serde_json::{Map, Value};
use std::fmt;

use super::error::PathError;

// ============================================================================
// Field Path
// ============================================================================

/// Segment of a field path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Object key access: `.billing`
    Key(String),
    /// Array row access: `.0`, `.1`, etc.
    Index(usize),
    /// Row-template placeholder for schema-level paths: `.*`
    Each,
}

/// Dotted path into Form Values (e.g. `billing.cardNumber` or `contacts.0.email`)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Create a root path (empty)
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the depth (number of segments)
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Push a key segment
    pub fn push_key(&self, name: &str) -> Self {
        let mut new = self.clone();
        new.segments.push(PathSegment::Key(name.to_string()));
        new
    }

    /// Push an array index segment
    pub fn push_index(&self, idx: usize) -> Self {
        let mut new = self.clone();
        new.segments.push(PathSegment::Index(idx));
        new
    }

    /// Push a row-template placeholder
    pub fn push_each(&self) -> Self {
        let mut new = self.clone();
        new.segments.push(PathSegment::Each);
        new
    }

    /// Get the last segment
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Get the parent path (without the last segment)
    pub fn parent(&self) -> Self {
        let mut new = self.clone();
        new.segments.pop();
        new
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when the path still contains row-template placeholders
    pub fn is_template(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, PathSegment::Each))
    }

    /// True when `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The schema-level form of this path: every row index becomes `*`
    pub fn template(&self) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .map(|s| match s {
                    PathSegment::Index(_) => PathSegment::Each,
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Fill this template's placeholders with the row indices found at the
    /// same positions of `concrete`. Placeholders with no matching index stay.
    pub fn instantiate(&self, concrete: &FieldPath) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .enumerate()
                .map(|(i, s)| match (s, concrete.segments.get(i)) {
                    (PathSegment::Each, Some(PathSegment::Index(idx))) => PathSegment::Index(*idx),
                    (other, _) => other.clone(),
                })
                .collect(),
        }
    }

    /// Parse a path string. Accepts dots (`items.0.name`) and brackets
    /// (`items[0].name`); all-digit segments are row indices and `*` is the
    /// row-template placeholder.
    pub fn parse(s: &str) -> Self {
        let segments = s
            .split(|c| c == '.' || c == '[' || c == ']')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part == "*" {
                    PathSegment::Each
                } else if let Ok(idx) = part.parse::<usize>() {
                    PathSegment::Index(idx)
                } else {
                    PathSegment::Key(part.to_string())
                }
            })
            .collect();

        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match seg {
                PathSegment::Key(name) => f.write_str(name)?,
                PathSegment::Index(idx) => write!(f, "{}", idx)?,
                PathSegment::Each => f.write_str("*")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

// ============================================================================
// Ancestry Resolution
// ============================================================================

/// One step of a node's ancestry, ordered from the tree root down to the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ancestor<'a> {
    /// A field or container that owns data under this name
    Named(&'a str),
    /// A layout-only container (row without a name, unnamed tab)
    Anonymous,
    /// A concrete row of an enclosing array
    Row(usize),
    /// The row template of an enclosing array
    Template,
}

/// Resolve an ancestry chain into the node's data path
pub fn resolve_path(chain: &[Ancestor<'_>]) -> FieldPath {
    chain.iter().fold(FieldPath::root(), |path, step| match step {
        Ancestor::Named(name) => path.push_key(name),
        Ancestor::Anonymous => path,
        Ancestor::Row(idx) => path.push_index(*idx),
        Ancestor::Template => path.push_each(),
    })
}

// ============================================================================
// Value Access
// ============================================================================

/// Read the value stored at `path`
pub fn get<'v>(root: &'v Value, path: &FieldPath) -> Option<&'v Value> {
    path.segments().iter().try_fold(root, |value, seg| match seg {
        PathSegment::Key(key) => value.as_object()?.get(key),
        PathSegment::Index(idx) => value.as_array()?.get(*idx),
        PathSegment::Each => None,
    })
}

/// Write `value` at `path`, creating intermediate objects and arrays in
/// null slots. A value of the wrong shape in the way is never replaced, and
/// a row index may at most append to its array.
pub fn set(root: &mut Value, path: &FieldPath, value: Value) -> Result<(), PathError> {
    if path.is_template() {
        return Err(PathError::Template(path.to_string()));
    }

    let mut slot = root;
    for seg in path.segments() {
        slot = match seg {
            PathSegment::Key(key) => {
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                match slot {
                    Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                    _ => return Err(PathError::Unwritable(path.to_string())),
                }
            }
            PathSegment::Index(idx) => {
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                match slot {
                    Value::Array(items) if *idx <= items.len() => {
                        if *idx == items.len() {
                            items.push(Value::Null);
                        }
                        &mut items[*idx]
                    }
                    _ => return Err(PathError::Unwritable(path.to_string())),
                }
            }
            PathSegment::Each => return Err(PathError::Template(path.to_string())),
        };
    }

    *slot = value;
    Ok(())
}

/// Nearest object at or above `scope`, falling back to the root
pub fn scope_data<'v>(root: &'v Value, scope: &FieldPath) -> &'v Value {
    let mut current = scope.clone();
    while !current.is_root() {
        if let Some(value @ Value::Object(_)) = get(root, &current) {
            return value;
        }
        current = current.parent();
    }
    root
}

/// The nearest enclosing object of the value at `path` (the field's siblings)
pub fn sibling_data<'v>(root: &'v Value, path: &FieldPath) -> &'v Value {
    scope_data(root, &path.parent())
}

// ============================================================================
// Tests
// ============================================================================
