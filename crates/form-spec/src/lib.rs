#![allow(missing_docs)]

pub mod answers;
pub mod condition;
pub mod progress;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerStore, is_blank, normalize_value, number_value};
pub use condition::Condition;
pub use progress::{Progress, progress_at};
pub use spec::{
    ConfirmStep, FieldKind, FieldSpec, FormSchema, FormStep, IntroStep, Requirement, SchemaError,
    StepSpec,
};
pub use validate::{FieldError, StepValidation, find_first_invalid_step, validate_step};
pub use visibility::{
    VisibilityMap, is_required, is_visible, prune_hidden_answers, resolve_visibility,
};
