use crate::spec::FormSchema;
use crate::spec::step::StepSpec;

/// Position in the questionnaire derived from declared page numbers rather
/// than sequence indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub page: u32,
    pub percent: u32,
}

/// Progress for the step at `step_index`. The bar reaches 100% only on the
/// confirm step; the last form page stays short of it.
pub fn progress_at(schema: &FormSchema, step_index: usize) -> Progress {
    let total = schema.total_pages().max(2);
    let step = schema.steps.get(step_index);

    if matches!(step, Some(StepSpec::Confirm(_))) {
        return Progress {
            page: total,
            percent: 100,
        };
    }

    let page = step.and_then(StepSpec::page).unwrap_or(1).clamp(1, total);
    let percent = (f64::from(page - 1) / f64::from(total - 1) * 100.0).round() as u32;
    Progress { page, percent }
}
