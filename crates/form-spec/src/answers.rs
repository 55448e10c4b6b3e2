use serde_json::{Map, Value};

use crate::spec::field::{FieldKind, FieldSpec};

/// Mutable answer state keyed by field id. Values are JSON: strings,
/// numbers, booleans, or arrays of strings depending on the field type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    values: Map<String, Value>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn set(&mut self, id: &str, value: Value) {
        self.values.insert(id.to_string(), value);
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.values.remove(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// True for the values the engine treats as "no answer": JSON null and the
/// empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Coerces a raw edit into storage shape: strings are trimmed; numeric
/// widgets parse their text into a finite JSON number and keep the text
/// verbatim when it does not parse. The empty string survives as-is so a
/// cleared input stays distinguishable from an untouched one.
pub fn normalize_value(field: &FieldSpec, raw: Value) -> Value {
    match (field.kind, raw) {
        (FieldKind::Number | FieldKind::Range, Value::String(text)) => {
            if text.is_empty() {
                return Value::String(text);
            }
            match text.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => number_value(parsed),
                _ => Value::String(text),
            }
        }
        (_, Value::String(text)) => Value::String(text.trim().to_string()),
        (_, other) => other,
    }
}

/// JSON number from a float; non-finite input becomes null.
pub fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_numeric_text() {
        let field = FieldSpec::new("budget", FieldKind::Number);
        assert_eq!(normalize_value(&field, json!(" 1200 ")), json!(1200.0));
        assert_eq!(normalize_value(&field, json!("12abc")), json!("12abc"));
        assert_eq!(normalize_value(&field, json!("")), json!(""));
    }

    #[test]
    fn trims_plain_strings() {
        let field = FieldSpec::new("name", FieldKind::Text);
        assert_eq!(normalize_value(&field, json!("  Ada ")), json!("Ada"));
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!([])));
    }
}
