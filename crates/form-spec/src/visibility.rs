use std::collections::BTreeMap;

use crate::answers::{AnswerStore, is_blank};
use crate::spec::FormSchema;
use crate::spec::field::{FieldSpec, Requirement};

pub type VisibilityMap = BTreeMap<String, bool>;

pub fn is_visible(field: &FieldSpec, answers: &AnswerStore) -> bool {
    match &field.show_when {
        Some(condition) => condition.evaluate(answers.as_map()),
        None => true,
    }
}

pub fn is_required(field: &FieldSpec, answers: &AnswerStore) -> bool {
    match &field.required {
        Requirement::Always(required) => *required,
        Requirement::When { when } => when.evaluate(answers.as_map()),
    }
}

/// Visibility for every field in the schema, recomputed from scratch.
pub fn resolve_visibility(schema: &FormSchema, answers: &AnswerStore) -> VisibilityMap {
    schema
        .fields()
        .map(|field| (field.id.clone(), is_visible(field, answers)))
        .collect()
}

/// Deletes answers whose `showWhen` gate currently evaluates false, so a
/// hidden field can never leak a stale value into submission or reappear
/// pre-filled. Runs before the next validation or persistence event whenever
/// a condition driver changes.
///
/// The pass is sequential in declaration order: deleting one answer can hide
/// a later field in the same pass, so chained conditions collapse together.
pub fn prune_hidden_answers(schema: &FormSchema, answers: &mut AnswerStore) -> Vec<String> {
    let mut removed = Vec::new();
    for step in &schema.steps {
        for field in step.fields() {
            if field.show_when.is_none() {
                continue;
            }
            if is_visible(field, answers) {
                continue;
            }
            if answers.get(&field.id).is_none_or(is_blank) {
                continue;
            }
            answers.remove(&field.id);
            removed.push(field.id.clone());
        }
    }
    removed
}
