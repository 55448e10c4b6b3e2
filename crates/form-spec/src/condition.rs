use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single comparison against the current answers.
///
/// One comparison key is expected per condition; when several are present
/// `equals` wins over `not_equals`, which wins over `includes`. A condition
/// with no comparison key evaluates to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Value>,
}

impl Condition {
    /// Evaluates against an answer map. An unset referenced answer compares
    /// as absent: `equals` is false, `not_equals` is true, `includes` is
    /// false. `includes` against a non-array answer is false, not an error.
    pub fn evaluate(&self, answers: &Map<String, Value>) -> bool {
        let answer = answers.get(&self.field);

        if let Some(expected) = &self.equals {
            return answer == Some(expected);
        }
        if let Some(expected) = &self.not_equals {
            return answer != Some(expected);
        }
        if let Some(needle) = &self.includes {
            return match answer {
                Some(Value::Array(items)) => items.contains(needle),
                _ => false,
            };
        }

        true
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: Some(value.into()),
            not_equals: None,
            includes: None,
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: None,
            not_equals: Some(value.into()),
            includes: None,
        }
    }

    pub fn includes(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: None,
            not_equals: None,
            includes: Some(value.into()),
        }
    }
}
