pub mod field;
pub mod step;

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use field::{FieldKind, FieldSpec, Requirement};
pub use step::{ConfirmStep, FormStep, IntroStep, StepSpec};

use crate::condition::Condition;

/// Top-level questionnaire definition, loaded once per session and immutable
/// afterwards. A persisted snapshot whose version differs from the live
/// schema's version is discarded on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSchema {
    pub version: String,
    pub steps: Vec<StepSpec>,
}

/// Structural problems that make a schema unusable for a session.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("schema has no steps")]
    Empty,
    #[error("first step must be an intro step")]
    MissingIntro,
    #[error("last step must be a confirm step")]
    MissingConfirm,
    #[error("unexpected {kind} step at index {index}")]
    MisplacedStep { index: usize, kind: &'static str },
    #[error("duplicate field id '{0}'")]
    DuplicateField(String),
    #[error("form step at index {index} declares page {page} outside 1..={total}")]
    PageOutOfRange { index: usize, page: u32, total: u32 },
}

impl FormSchema {
    /// Parses and structurally checks a schema document.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_json::from_str(raw).map_err(SchemaError::Parse)?;
        schema.check()?;
        Ok(schema)
    }

    /// Structural check: exactly one intro at index 0, exactly one confirm at
    /// the last index, form pages within the declared range, field ids unique
    /// across the whole schema.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.steps.is_empty() {
            return Err(SchemaError::Empty);
        }
        if !matches!(self.steps.first(), Some(StepSpec::Intro(_))) {
            return Err(SchemaError::MissingIntro);
        }
        if !matches!(self.steps.last(), Some(StepSpec::Confirm(_))) {
            return Err(SchemaError::MissingConfirm);
        }

        let last = self.steps.len() - 1;
        for (index, step) in self.steps.iter().enumerate() {
            let misplaced = match step {
                StepSpec::Intro(_) => index != 0,
                StepSpec::Confirm(_) => index != last,
                StepSpec::Form(_) => false,
            };
            if misplaced {
                return Err(SchemaError::MisplacedStep {
                    index,
                    kind: step.kind_name(),
                });
            }
        }

        let total = self.total_pages();
        let mut seen = BTreeSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if let StepSpec::Form(form) = step
                && (form.page == 0 || form.page > total)
            {
                return Err(SchemaError::PageOutOfRange {
                    index,
                    page: form.page,
                    total,
                });
            }
            for field in step.fields() {
                if !seen.insert(field.id.clone()) {
                    return Err(SchemaError::DuplicateField(field.id.clone()));
                }
            }
        }

        Ok(())
    }

    /// Highest declared page number; progress is measured against this.
    pub fn total_pages(&self) -> u32 {
        self.steps
            .iter()
            .filter_map(StepSpec::page)
            .max()
            .unwrap_or(1)
    }

    /// Page of the last form step, the submission trigger boundary. The
    /// boundary is a page number, not a sequence position.
    pub fn last_form_page(&self) -> u32 {
        self.steps
            .iter()
            .filter_map(|step| match step {
                StepSpec::Form(form) => Some(form.page),
                _ => None,
            })
            .max()
            .unwrap_or(1)
    }

    /// Every field across all steps, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.steps.iter().flat_map(StepSpec::fields)
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields().find(|field| field.id == id)
    }

    /// Field ids that gate other fields' visibility or requiredness. An edit
    /// to one of these triggers a whole-schema visibility recomputation.
    /// Fixed for the session lifetime since the schema is immutable.
    pub fn condition_drivers(&self) -> BTreeSet<String> {
        let mut drivers = BTreeSet::new();
        for field in self.fields() {
            if let Some(condition) = &field.show_when {
                drivers.insert(condition.field.clone());
            }
            if let Requirement::When { when } = &field.required {
                drivers.insert(when.field.clone());
            }
        }
        drivers
    }

    fn condition_fields(&self) -> impl Iterator<Item = &Condition> {
        self.fields().flat_map(|field| {
            let requirement = match &field.required {
                Requirement::When { when } => Some(when),
                Requirement::Always(_) => None,
            };
            field.show_when.iter().chain(requirement)
        })
    }

    /// Condition references pointing at field ids the schema never declares.
    /// Diagnostic only; such conditions evaluate against absent answers.
    pub fn dangling_condition_refs(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self.fields().map(|field| field.id.as_str()).collect();
        self.condition_fields()
            .map(|condition| condition.field.as_str())
            .filter(|referenced| !ids.contains(referenced))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intro() -> StepSpec {
        StepSpec::Intro(IntroStep {
            title: "Welcome".into(),
            subtitle: None,
            bullets: Vec::new(),
            cta: None,
        })
    }

    fn confirm() -> StepSpec {
        StepSpec::Confirm(ConfirmStep {
            title: "Done".into(),
            subtitle: None,
            page: Some(2),
        })
    }

    fn form(page: u32, fields: Vec<FieldSpec>) -> StepSpec {
        StepSpec::Form(FormStep {
            page,
            title: String::new(),
            subtitle: None,
            fields,
        })
    }

    #[test]
    fn accepts_minimal_schema() {
        let schema = FormSchema {
            version: "1".into(),
            steps: vec![
                intro(),
                form(1, vec![FieldSpec::new("name", FieldKind::Text)]),
                confirm(),
            ],
        };
        assert!(schema.check().is_ok());
        assert_eq!(schema.total_pages(), 2);
        assert_eq!(schema.last_form_page(), 1);
    }

    #[test]
    fn rejects_schema_without_leading_intro() {
        let schema = FormSchema {
            version: "1".into(),
            steps: vec![form(1, Vec::new()), confirm()],
        };
        assert!(matches!(schema.check(), Err(SchemaError::MissingIntro)));
    }

    #[test]
    fn rejects_duplicate_field_ids() {
        let schema = FormSchema {
            version: "1".into(),
            steps: vec![
                intro(),
                form(1, vec![FieldSpec::new("email", FieldKind::Email)]),
                form(2, vec![FieldSpec::new("email", FieldKind::Email)]),
                confirm(),
            ],
        };
        assert!(matches!(
            schema.check(),
            Err(SchemaError::DuplicateField(id)) if id == "email"
        ));
    }

    #[test]
    fn collects_condition_drivers_from_both_gates() {
        let mut shown = FieldSpec::new("detail", FieldKind::Text);
        shown.show_when = Some(Condition::equals("kind", "other"));
        let mut gated = FieldSpec::new("phone", FieldKind::Tel);
        gated.required = Requirement::When {
            when: Condition::not_equals("contact", "email"),
        };
        let schema = FormSchema {
            version: "1".into(),
            steps: vec![
                intro(),
                form(
                    1,
                    vec![
                        FieldSpec::new("kind", FieldKind::Select),
                        FieldSpec::new("contact", FieldKind::Radio),
                        shown,
                        gated,
                    ],
                ),
                confirm(),
            ],
        };
        let drivers = schema.condition_drivers();
        assert!(drivers.contains("kind"));
        assert!(drivers.contains("contact"));
        assert_eq!(drivers.len(), 2);
        assert!(schema.dangling_condition_refs().is_empty());
    }
}
