//! Declarative predicates for persisted field definitions
//!
//! Stored documents cannot carry closures, so `hidden`, `disabled`,
//! `readOnly` and `condition` may be written as a `Condition` instead:
//!
//! ```json
//! { "disabled": { "falsy": "emailNotifications" } }
//! { "condition": { "equals": { "field": "plan", "value": "pro" } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::{self, FieldPath};

/// A predicate over `(data, siblingData)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// The referenced value is truthy
    Truthy(String),
    /// The referenced value is falsy (null, false, 0, "" or missing)
    Falsy(String),
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn evaluate(&self, data: &Value, sibling: &Value) -> bool {
        match self {
            Condition::Truthy(field) => is_truthy(lookup(field, data, sibling)),
            Condition::Falsy(field) => !is_truthy(lookup(field, data, sibling)),
            Condition::Equals { field, value } => lookup(field, data, sibling) == value,
            Condition::NotEquals { field, value } => lookup(field, data, sibling) != value,
            Condition::In { field, values } => values.contains(lookup(field, data, sibling)),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(data, sibling)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(data, sibling)),
            Condition::Not(condition) => !condition.evaluate(data, sibling),
        }
    }
}

/// Sibling data wins when it holds the first segment of `field`; otherwise the
/// path is read from the root.
fn lookup<'v>(field: &str, data: &'v Value, sibling: &'v Value) -> &'v Value {
    let path = FieldPath::parse(field);
    let in_sibling = match path.segments().first() {
        Some(path::PathSegment::Key(key)) => sibling.get(key).is_some(),
        _ => false,
    };
    let source = if in_sibling { sibling } else { data };
    path::get(source, &path).unwrap_or(&Value::Null)
}

/// Truthiness as host form values use it
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy_and_falsy() {
        let data = json!({ "emailNotifications": false, "name": "Ada" });
        assert!(Condition::Falsy("emailNotifications".into()).evaluate(&data, &data));
        assert!(Condition::Truthy("name".into()).evaluate(&data, &data));
        assert!(Condition::Falsy("missing".into()).evaluate(&data, &data));
    }

    #[test]
    fn test_sibling_lookup_takes_precedence() {
        let data = json!({ "kind": "root", "rows": [{ "kind": "row" }] });
        let sibling = json!({ "kind": "row" });
        let cond = Condition::Equals {
            field: "kind".into(),
            value: json!("row"),
        };
        assert!(cond.evaluate(&data, &sibling));
        assert!(!cond.evaluate(&data, &json!({})));
    }

    #[test]
    fn test_deserialize_nested() {
        let cond: Condition = serde_json::from_value(json!({
            "all": [
                { "truthy": "enabled" },
                { "not": { "in": { "field": "plan", "values": ["free", "trial"] } } }
            ]
        }))
        .unwrap();

        assert!(cond.evaluate(&json!({ "enabled": true, "plan": "pro" }), &json!({})));
        assert!(!cond.evaluate(&json!({ "enabled": true, "plan": "free" }), &json!({})));
    }
}
