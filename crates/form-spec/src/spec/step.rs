use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::FieldSpec;

/// Landing step shown before any form page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntroStep {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

/// One page of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormStep {
    pub page: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
}

/// Terminal step shown only after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfirmStep {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A single step of the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSpec {
    Intro(IntroStep),
    Form(FormStep),
    Confirm(ConfirmStep),
}

impl StepSpec {
    pub fn page(&self) -> Option<u32> {
        match self {
            StepSpec::Intro(_) => None,
            StepSpec::Form(form) => Some(form.page),
            StepSpec::Confirm(confirm) => confirm.page,
        }
    }

    /// Fields declared on this step; empty for non-form steps.
    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            StepSpec::Form(form) => &form.fields,
            _ => &[],
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, StepSpec::Form(_))
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            StepSpec::Intro(_) => "intro",
            StepSpec::Form(_) => "form",
            StepSpec::Confirm(_) => "confirm",
        }
    }
}
