use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::{AnswerStore, is_blank};
use crate::spec::FormSchema;
use crate::spec::field::FieldKind;
use crate::spec::step::StepSpec;
use crate::visibility::{is_required, is_visible};

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Why a single field failed validation. `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldError {
    #[error("This field is required.")]
    Required,
    #[error("Select at least {expected} option(s).")]
    MinItems { expected: usize },
    #[error("Invalid email address.")]
    InvalidEmail,
    #[error("Invalid number.")]
    InvalidNumber,
    #[error("Minimum: {min}.")]
    BelowMin { min: f64 },
    #[error("Invalid value.")]
    InvalidRange,
}

/// Outcome of validating one step. Pure data: surfacing the errors is the
/// caller's concern, which is what lets the same function scan the whole
/// schema without side effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepValidation {
    pub first_invalid: Option<String>,
    pub errors: BTreeMap<String, FieldError>,
}

impl StepValidation {
    pub fn ok(&self) -> bool {
        self.first_invalid.is_none()
    }

    fn record(&mut self, id: &str, error: FieldError) {
        if self.first_invalid.is_none() {
            self.first_invalid = Some(id.to_string());
        }
        self.errors.insert(id.to_string(), error);
    }
}

/// Validates the visible fields of a form step in declaration order.
/// Non-form steps are trivially valid. Hidden honeypot fields are skipped:
/// their content is a server-side concern.
pub fn validate_step(step: &StepSpec, answers: &AnswerStore) -> StepValidation {
    let mut result = StepValidation::default();
    let StepSpec::Form(form) = step else {
        return result;
    };

    for field in &form.fields {
        if !is_visible(field, answers) {
            continue;
        }
        if field.is_honeypot() {
            continue;
        }

        let answer = answers.get(&field.id);

        if is_required(field, answers) {
            match field.kind {
                FieldKind::Checkbox | FieldKind::CheckboxLink => {
                    if answer != Some(&Value::Bool(true)) {
                        result.record(&field.id, FieldError::Required);
                    }
                }
                FieldKind::Checkboxes => {
                    let checked = answer.and_then(Value::as_array).map_or(0, Vec::len);
                    let expected = field.min_items.unwrap_or(1);
                    if checked < expected {
                        result.record(&field.id, FieldError::MinItems { expected });
                    }
                }
                _ => {
                    if answer.is_none_or(is_blank) {
                        result.record(&field.id, FieldError::Required);
                    }
                }
            }
        }

        // Format checks apply whenever a value is present, required or not.
        let Some(value) = answer else { continue };
        if is_blank(value) {
            continue;
        }

        match field.kind {
            FieldKind::Email => {
                if !EMAIL_SHAPE.is_match(&text_of(value)) {
                    result.record(&field.id, FieldError::InvalidEmail);
                }
            }
            FieldKind::Number => match finite_number(value) {
                None => result.record(&field.id, FieldError::InvalidNumber),
                Some(number) => {
                    if let Some(min) = field.min
                        && number < min
                    {
                        result.record(&field.id, FieldError::BelowMin { min });
                    }
                }
            },
            FieldKind::Range => {
                if finite_number(value).is_none() {
                    result.record(&field.id, FieldError::InvalidRange);
                }
            }
            _ => {}
        }
    }

    result
}

/// Index of the earliest form step that does not validate against the
/// current answers. Used at load time so a resumed session is never dropped
/// onto a step whose prerequisites were never satisfied.
pub fn find_first_invalid_step(schema: &FormSchema, answers: &AnswerStore) -> Option<usize> {
    schema
        .steps
        .iter()
        .position(|step| step.is_form() && !validate_step(step, answers).ok())
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|parsed| parsed.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
