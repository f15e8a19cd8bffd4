//! Built-in per-kind validation rules

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::domain::error::{Rule, ValidationError};
use crate::domain::field::{ArrayContainer, FieldKind, LeafField};

/// Kind-specific emptiness used by `required`
pub fn is_empty(kind: FieldKind, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(false) => kind.is_toggle(),
        _ => false,
    }
}

/// String length in UTF-16 code units
pub fn text_length(s: &str) -> usize {
    s.encode_utf16().count()
}

/// The value as the pattern rule sees it
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Numbers and numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// `local@domain.tld` with no whitespace and a dotted domain
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("EMAIL pattern failed")
});

pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

/// `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

fn display_name(field: &LeafField) -> &str {
    field.label.as_deref().unwrap_or(&field.name)
}

/// Run the built-in rules of `field` against `value`, in rule order.
/// A failed `required` stops further checks; an empty optional value has
/// nothing to check.
pub fn check_leaf(field: &LeafField, value: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let name = display_name(field);

    if is_empty(field.kind, value) {
        if field.required {
            errors.push(ValidationError::new(Rule::Required, format!("{} is required", name)));
        }
        return errors;
    }

    if let Some(error) = check_format(field.kind, value) {
        errors.push(error);
    }

    let c = &field.constraints;
    let length = match value {
        Value::String(s) => Some(text_length(s)),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };
    if let Some(length) = length {
        if let Some(min) = c.min_length.filter(|min| length < *min) {
            errors.push(ValidationError::new(
                Rule::MinLength,
                format!("{} must be at least {} characters", name, min),
            ));
        }
        if let Some(max) = c.max_length.filter(|max| length > *max) {
            errors.push(ValidationError::new(
                Rule::MaxLength,
                format!("{} must be at most {} characters", name, max),
            ));
        }
    }

    if let Some(pattern) = &c.pattern {
        if !pattern.is_match(&stringify(value)) {
            errors.push(ValidationError::new(Rule::Pattern, format!("{} has an invalid format", name)));
        }
    }

    if let Some(number) = as_number(value) {
        if let Some(min) = c.min.filter(|min| number < *min) {
            errors.push(ValidationError::new(Rule::Min, format!("{} must be at least {}", name, min)));
        }
        if let Some(max) = c.max.filter(|max| number > *max) {
            errors.push(ValidationError::new(Rule::Max, format!("{} must be at most {}", name, max)));
        }
    }

    if let Value::Array(items) = value {
        if let Some(min) = c.min_selected.filter(|min| items.len() < *min) {
            errors.push(ValidationError::new(
                Rule::MinSelected,
                format!("Select at least {} for {}", min, name),
            ));
        }
        if let Some(max) = c.max_selected.filter(|max| items.len() > *max) {
            errors.push(ValidationError::new(
                Rule::MaxSelected,
                format!("Select at most {} for {}", max, name),
            ));
        }
    }

    errors
}

/// Kind-native format checks
fn check_format(kind: FieldKind, value: &Value) -> Option<ValidationError> {
    let valid = match (kind, value) {
        (FieldKind::Email, Value::String(s)) => is_email(s),
        (FieldKind::Email, _) => false,
        (FieldKind::Number, value) => as_number(value).is_some(),
        (FieldKind::Date, Value::String(s)) => is_date(s),
        (FieldKind::Date, _) => false,
        _ => true,
    };

    if valid {
        return None;
    }
    let message = match kind {
        FieldKind::Email => "Enter a valid email address",
        FieldKind::Number => "Enter a number",
        _ => "Enter a valid date",
    };
    Some(ValidationError::new(Rule::Format, message))
}

/// Row-count rules of an array container
pub fn check_rows(array: &ArrayContainer, value: Option<&Value>) -> Vec<ValidationError> {
    let rows = value.and_then(Value::as_array).map_or(0, Vec::len);
    let name = array.label.as_deref().unwrap_or(&array.name);
    let mut errors = Vec::new();

    if let Some(min) = array.min_rows.filter(|min| rows < *min) {
        errors.push(ValidationError::new(
            Rule::MinRows,
            format!("{} needs at least {} rows", name, min),
        ));
    }
    if let Some(max) = array.max_rows.filter(|max| rows > *max) {
        errors.push(ValidationError::new(
            Rule::MaxRows,
            format!("{} allows at most {} rows", name, max),
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::FieldDef;
    use crate::domain::field::FieldNode;
    use crate::domain::tree::FormTree;
    use serde_json::json;

    fn leaf(def: FieldDef) -> LeafField {
        match FormTree::from_defs(vec![def]).unwrap().nodes()[0].clone() {
            FieldNode::Leaf(leaf) => leaf,
            other => panic!("expected a leaf, got {:?}", other),
        }
    }

    fn rules(errors: &[ValidationError]) -> Vec<Rule> {
        errors.iter().map(|e| e.rule).collect()
    }

    #[test]
    fn test_required_emptiness_per_kind() {
        let text = leaf(FieldDef::text("name").required(true));
        let toggle = leaf(FieldDef::checkbox("terms").required(true));

        for empty in [json!(""), json!(null), json!([])] {
            assert_eq!(rules(&check_leaf(&text, &empty)), vec![Rule::Required]);
            assert_eq!(rules(&check_leaf(&toggle, &empty)), vec![Rule::Required]);
        }
        assert_eq!(rules(&check_leaf(&toggle, &json!(false))), vec![Rule::Required]);
        assert!(check_leaf(&toggle, &json!(true)).is_empty());
        assert!(check_leaf(&text, &json!(false)).is_empty());
        assert!(check_leaf(&text, &json!("x")).is_empty());
    }

    #[test]
    fn test_optional_empty_value_skips_rules() {
        let field = leaf(FieldDef::email("email").min_length(5));
        assert!(check_leaf(&field, &json!("")).is_empty());
    }

    #[test]
    fn test_length_counts_utf16_units() {
        let field = leaf(FieldDef::text("emoji").max_length(2));
        // One astral-plane character is two UTF-16 code units
        assert!(check_leaf(&field, &json!("😀")).is_empty());
        assert_eq!(rules(&check_leaf(&field, &json!("😀a"))), vec![Rule::MaxLength]);
    }

    #[test]
    fn test_pattern_searches_stringified_value() {
        let field = leaf(FieldDef::text("code").pattern("[0-9]"));
        assert!(check_leaf(&field, &json!("abc1")).is_empty());
        assert_eq!(rules(&check_leaf(&field, &json!("abc"))), vec![Rule::Pattern]);

        let numeric = leaf(FieldDef::number("zip").pattern("^[0-9]{4}$"));
        assert!(check_leaf(&numeric, &json!(1234)).is_empty());
    }

    #[test]
    fn test_numeric_bounds_and_format() {
        let field = leaf(FieldDef::number("age").min(18.0).max(130.0));
        assert_eq!(rules(&check_leaf(&field, &json!(12))), vec![Rule::Min]);
        assert_eq!(rules(&check_leaf(&field, &json!("140"))), vec![Rule::Max]);
        assert_eq!(rules(&check_leaf(&field, &json!("abc"))), vec![Rule::Format]);
    }

    #[test]
    fn test_selection_cardinality() {
        let field = leaf(FieldDef::tags("topics").min_selected(1).max_selected(2));
        assert!(check_leaf(&field, &json!(["a"])).is_empty());
        assert_eq!(rules(&check_leaf(&field, &json!(["a", "b", "c"]))), vec![Rule::MaxSelected]);
    }

    #[test]
    fn test_email_and_date_formats() {
        assert!(is_email("ada@example.com"));
        assert!(!is_email("ada@example"));
        assert!(!is_email("ada example@x.io"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("ada@@example.com"));
        assert!(!is_email("ada@example..com"));
        assert!(is_email("ada.lovelace+forms@mail.example.co.uk"));

        assert!(is_date("2024-02-29"));
        assert!(is_date("2024-02-29T10:00:00Z"));
        assert!(!is_date("2023-02-29"));
    }

    #[test]
    fn test_row_bounds() {
        let tree = FormTree::from_defs(vec![FieldDef::array("contacts", vec![FieldDef::text("email")])
            .min_rows(1)
            .max_rows(2)])
        .unwrap();
        let array = match &tree.nodes()[0] {
            FieldNode::Array(a) => a,
            _ => unreachable!(),
        };

        assert_eq!(rules(&check_rows(array, None)), vec![Rule::MinRows]);
        assert!(check_rows(array, Some(&json!([{}]))).is_empty());
        assert_eq!(rules(&check_rows(array, Some(&json!([{}, {}, {}])))), vec![Rule::MaxRows]);
    }
}
