use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use form_spec::spec::field::{FieldKind, FieldSpec};
use form_spec::spec::step::StepSpec;
use form_spec::{
    AnswerStore, FormSchema, Progress, SchemaError, StepValidation, find_first_invalid_step,
    is_visible, normalize_value, number_value, progress_at, prune_hidden_answers, validate_step,
};

use crate::clock::Clock;
use crate::persist::SnapshotStore;
use crate::snapshot::Snapshot;
use crate::storage::{SnapshotBackend, StorageError};
use crate::submit::{
    CODE_RATE_LIMIT, SUBMIT_TIMEOUT, SubmissionClient, SubmissionMeta, SubmissionRequest,
    SubmitOutcome, interpret_response,
};
use crate::tracking::{CampaignParams, TrackingContext};

const MSG_TIMEOUT: &str = "The server took too long to respond. Please retry.";
const MSG_NETWORK: &str = "Network unavailable. Please retry.";
const MSG_GENERIC: &str = "Something went wrong. Please retry.";
const MSG_MISSING_ANALYSIS: &str = "The analysis is missing from the response. Please retry.";

/// Static knobs fixed at session start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Form identity; doubles as the tracking tag and the storage key stem.
    pub tag: String,
    /// Page that triggers submission instead of advancing. Defaults to the
    /// highest form-step page in the schema.
    pub submit_page: Option<u32>,
    /// Exposes the computed payload for diagnostics; no behavior change.
    pub debug: bool,
}

impl SessionConfig {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            submit_page: None,
            debug: false,
        }
    }

    /// Versioned storage key; the suffix changes when the snapshot format
    /// does, so format changes are distinguishable from stale sessions.
    pub fn storage_key(&self) -> String {
        format!("{}:v1", self.tag)
    }
}

/// Submission state machine. `Completed` is terminal: everything except an
/// explicit restart is blocked there.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
    Completed {
        submission_id: String,
        analysis_html: String,
    },
}

/// What the next button should do and say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextControl {
    Start(String),
    Next,
    Submit,
    Sending,
    RetryIn { seconds: u64 },
    Done,
}

/// Navigation control state, recomputed after every event and countdown
/// tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub next: NextControl,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is completed; restart to edit again")]
    Terminal,
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Owns all mutable session state and composes the model layer on every
/// user action. Constructed at session start, torn down by `restart`.
pub struct Session<B> {
    schema: FormSchema,
    config: SessionConfig,
    clock: Box<dyn Clock>,
    store: SnapshotStore<B>,
    drivers: BTreeSet<String>,
    step_index: usize,
    answers: AnswerStore,
    tracking: TrackingContext,
    rate_limit_until: i64,
    submit_state: SubmitState,
    banner: Option<String>,
    step_errors: StepValidation,
    resumed: bool,
}

impl<B: SnapshotBackend> Session<B> {
    /// Starts a session: checks the schema (a bad schema is fatal), restores
    /// any still-valid snapshot, and relocates back past unmet
    /// prerequisites. `query` is the raw query string carrying campaign
    /// parameters.
    pub fn start(
        schema: FormSchema,
        config: SessionConfig,
        backend: B,
        query: &str,
        clock: Box<dyn Clock>,
    ) -> Result<Self, SchemaError> {
        schema.check()?;
        let mut store = SnapshotStore::new(backend);
        let now = clock.now();

        // The session id outlives snapshot invalidation, so it is read from
        // the raw slot before TTL and version checks run.
        let params = CampaignParams::from_query(query);
        let stored_id = store
            .load_raw()
            .and_then(|snapshot| snapshot.tracking)
            .map(|tracking| tracking.session_id);
        let tracking = match stored_id {
            Some(session_id) => TrackingContext {
                session_id,
                tag: config.tag.clone(),
                params,
            },
            None => TrackingContext::new(config.tag.clone(), params),
        };

        let mut session = Self {
            drivers: schema.condition_drivers(),
            schema,
            config,
            clock,
            store,
            step_index: 0,
            answers: AnswerStore::new(),
            tracking,
            rate_limit_until: 0,
            submit_state: SubmitState::Idle,
            banner: None,
            step_errors: StepValidation::default(),
            resumed: false,
        };

        let last = session.schema.steps.len() - 1;
        if let Some(snapshot) = session.store.load_valid(&session.schema.version, now) {
            session.answers = AnswerStore::from_map(snapshot.answers);
            session.step_index = snapshot.step_index.min(last);
            session.rate_limit_until = snapshot.rate_limit_until;
            session.resumed = !session.answers.is_empty();
        }

        // Never land on the terminal confirm step.
        if matches!(session.current_step(), StepSpec::Confirm(_)) {
            session.step_index = 0;
        }

        // A resumed session may not sit past a step whose prerequisites were
        // never satisfied.
        if let Some(first_invalid) = find_first_invalid_step(&session.schema, &session.answers)
            && session.step_index > first_invalid
        {
            tracing::debug!(
                from = session.step_index,
                to = first_invalid,
                "resume relocated to first invalid step",
            );
            session.step_index = first_invalid;
        }

        session.seed_range_defaults();
        let snapshot = session.snapshot();
        if let Err(error) = session.store.write_now(&snapshot) {
            tracing::warn!(%error, "initial snapshot write failed");
        }
        tracing::info!(
            step = session.step_index,
            resumed = session.resumed,
            "session started",
        );
        Ok(session)
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn current_step(&self) -> &StepSpec {
        &self.schema.steps[self.step_index]
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn tracking(&self) -> &TrackingContext {
        &self.tracking
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn step_errors(&self) -> &StepValidation {
        &self.step_errors
    }

    pub fn submit_state(&self) -> &SubmitState {
        &self.submit_state
    }

    /// True when a still-valid snapshot contributed answers at start.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.submit_state, SubmitState::Completed { .. })
    }

    pub fn rate_limited(&self) -> bool {
        self.clock.now_ms() < self.rate_limit_until
    }

    /// Absolute rate-limit deadline in epoch milliseconds; 0 when none.
    pub fn rate_limit_until(&self) -> i64 {
        self.rate_limit_until
    }

    pub fn save_pending(&self) -> bool {
        self.store.save_pending()
    }

    pub fn progress(&self) -> Progress {
        progress_at(&self.schema, self.step_index)
    }

    /// Fields the renderer should show for the current step, in order.
    pub fn visible_fields(&self) -> Vec<&FieldSpec> {
        self.current_step()
            .fields()
            .iter()
            .filter(|field| is_visible(field, &self.answers))
            .collect()
    }

    /// Applies a field edit. When the edited field gates other fields, the
    /// whole-schema visibility is recomputed at once and answers behind
    /// now-false gates are deleted, before any later validation or
    /// persistence. Every edit schedules a debounced save.
    pub fn set_answer(&mut self, field_id: &str, raw: Value) -> Result<(), SessionError> {
        if self.is_terminal() {
            return Err(SessionError::Terminal);
        }
        let Some(field) = self.schema.field(field_id) else {
            return Err(SessionError::UnknownField(field_id.to_string()));
        };

        let value = normalize_value(field, raw);
        self.answers.set(field_id, value);

        if self.drivers.contains(field_id) {
            let removed = prune_hidden_answers(&self.schema, &mut self.answers);
            if !removed.is_empty() {
                tracing::debug!(
                    driver = field_id,
                    pruned = removed.len(),
                    "hidden conditional answers dropped",
                );
            }
        }

        self.store.schedule_save(self.clock.now());
        Ok(())
    }

    /// Convenience for checkbox groups: adds the option when absent, removes
    /// it when present.
    pub fn toggle_option(&mut self, field_id: &str, option: &str) -> Result<(), SessionError> {
        let mut items = match self.answers.get(field_id) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let needle = Value::String(option.to_string());
        if let Some(position) = items.iter().position(|item| item == &needle) {
            items.remove(position);
        } else {
            items.push(needle);
        }
        self.set_answer(field_id, Value::Array(items))
    }

    /// Advances one step. Form steps validate first; the designated last
    /// form page submits instead of advancing.
    pub async fn go_next(&mut self, client: &dyn SubmissionClient) {
        if matches!(self.submit_state, SubmitState::Submitting) {
            return;
        }
        if matches!(self.current_step(), StepSpec::Intro(_)) {
            self.step_index = 1;
            self.after_navigation();
            return;
        }
        if matches!(self.current_step(), StepSpec::Confirm(_)) {
            return;
        }

        self.step_errors = validate_step(self.current_step(), &self.answers);
        if !self.step_errors.ok() {
            tracing::debug!(
                first = self.step_errors.first_invalid.as_deref(),
                "step blocked by validation",
            );
            return;
        }

        if self.on_submit_page() {
            self.submit(client).await;
        } else {
            self.step_index = (self.step_index + 1).min(self.schema.steps.len() - 1);
            self.after_navigation();
        }
    }

    /// Steps back one step; a no-op while submitting, at the start, or after
    /// completion.
    pub fn go_prev(&mut self) {
        if matches!(self.submit_state, SubmitState::Submitting) || self.is_terminal() {
            return;
        }
        if self.step_index == 0 {
            return;
        }
        self.step_index -= 1;
        self.after_navigation();
    }

    /// Drives one submission attempt through the state machine. Every exit
    /// path leaves `Submitting`.
    pub async fn submit(&mut self, client: &dyn SubmissionClient) {
        if self.clock.now_ms() < self.rate_limit_until {
            return;
        }
        if !matches!(self.submit_state, SubmitState::Idle) {
            return;
        }

        self.submit_state = SubmitState::Submitting;
        self.banner = None;

        let request = self.submission_request();
        let outcome = match tokio::time::timeout(SUBMIT_TIMEOUT, client.submit(&request)).await {
            Err(_) => {
                tracing::warn!("submission timed out");
                self.banner = Some(MSG_TIMEOUT.to_string());
                self.submit_state = SubmitState::Idle;
                return;
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "submission transport failed");
                self.banner = Some(MSG_NETWORK.to_string());
                self.submit_state = SubmitState::Idle;
                return;
            }
            Ok(Ok(body)) => interpret_response(&body),
        };

        match outcome {
            SubmitOutcome::Rejected {
                error_code,
                user_message,
                retry_after_seconds,
            } => {
                if error_code == CODE_RATE_LIMIT
                    && let Some(seconds) = retry_after_seconds
                {
                    self.rate_limit_until = self.clock.now_ms() + seconds as i64 * 1_000;
                    self.store.schedule_save(self.clock.now());
                    tracing::info!(seconds, "submission rate limited");
                } else {
                    tracing::info!(code = %error_code, "submission rejected");
                }
                self.banner = Some(user_message.unwrap_or_else(|| MSG_GENERIC.to_string()));
                self.submit_state = SubmitState::Idle;
            }
            SubmitOutcome::Accepted {
                submission_id,
                analysis_html,
            } => {
                if analysis_html.is_empty() {
                    tracing::warn!("submission accepted without analysis payload");
                    self.banner = Some(MSG_MISSING_ANALYSIS.to_string());
                    self.submit_state = SubmitState::Idle;
                    return;
                }
                if let Err(error) = self.store.clear() {
                    tracing::warn!(%error, "failed to clear snapshot after submission");
                }
                self.step_index = self.schema.steps.len() - 1;
                self.banner = None;
                self.step_errors = StepValidation::default();
                tracing::info!(%submission_id, "submission accepted");
                self.submit_state = SubmitState::Completed {
                    submission_id,
                    analysis_html,
                };
            }
        }
    }

    /// Escape hatch available from every state, including the terminal one:
    /// clears persistence, resets all mutable state, and rotates the
    /// tracking session id.
    pub fn restart(&mut self) {
        if let Err(error) = self.store.clear() {
            tracing::warn!(%error, "failed to clear snapshot on restart");
        }
        self.step_index = 0;
        self.answers = AnswerStore::new();
        self.tracking = self.tracking.regenerate();
        self.submit_state = SubmitState::Idle;
        self.banner = None;
        self.step_errors = StepValidation::default();
        self.rate_limit_until = 0;
        self.resumed = false;
        self.seed_range_defaults();
        tracing::info!("session restarted");
    }

    /// Advances time-driven state: flushes a due debounced save and clears
    /// an elapsed rate-limit deadline. The host calls this on a recurring
    /// (typically 1 s) tick; true means controls or the save indicator
    /// should refresh.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        let mut changed = false;
        if self.store.save_pending() {
            let snapshot = self.snapshot_at(now);
            changed = match self.store.flush_due(&snapshot, now) {
                Ok(saved) => saved,
                Err(error) => {
                    tracing::warn!(%error, "debounced save failed");
                    false
                }
            };
        }

        if self.rate_limit_until != 0 && self.clock.now_ms() >= self.rate_limit_until {
            self.rate_limit_until = 0;
            changed = true;
        }

        changed
    }

    /// Flushes any pending save immediately; for host shutdown paths.
    pub fn flush(&mut self) -> Result<bool, StorageError> {
        let snapshot = self.snapshot();
        self.store.flush_now(&snapshot)
    }

    /// Button state derived from the full session state.
    pub fn controls(&self) -> Controls {
        let submitting = matches!(self.submit_state, SubmitState::Submitting);
        let now_ms = self.clock.now_ms();
        let rate_limited = now_ms < self.rate_limit_until;
        let on_submit_page = self.on_submit_page();

        let next = match self.current_step() {
            StepSpec::Intro(intro) => {
                NextControl::Start(intro.cta.clone().unwrap_or_else(|| "Start".to_string()))
            }
            StepSpec::Confirm(_) => NextControl::Done,
            StepSpec::Form(_) if on_submit_page => {
                if rate_limited {
                    let seconds = ((self.rate_limit_until - now_ms).max(0) as u64).div_ceil(1_000);
                    NextControl::RetryIn { seconds }
                } else if submitting {
                    NextControl::Sending
                } else {
                    NextControl::Submit
                }
            }
            StepSpec::Form(_) => NextControl::Next,
        };

        Controls {
            prev_enabled: self.step_index > 0 && !submitting && !self.is_terminal(),
            next_enabled: !submitting && !(on_submit_page && rate_limited) && !self.is_terminal(),
            next,
        }
    }

    /// Read-only view of the payload that would be submitted; only exposed
    /// in debug mode.
    pub fn debug_payload(&self) -> Option<Value> {
        self.config
            .debug
            .then(|| serde_json::to_value(self.submission_request()).unwrap_or(Value::Null))
    }

    /// Current state as it would be persisted.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(self.clock.now())
    }

    fn snapshot_at(&self, now: OffsetDateTime) -> Snapshot {
        Snapshot {
            schema_version: self.schema.version.clone(),
            step_index: self.step_index,
            answers: self.answers.as_map().clone(),
            tracking: Some(self.tracking.clone()),
            rate_limit_until: self.rate_limit_until,
            updated_at: now.format(&Rfc3339).unwrap_or_default(),
        }
    }

    fn submission_request(&self) -> SubmissionRequest {
        let submitted_at = self.clock.now().format(&Rfc3339).unwrap_or_default();
        SubmissionRequest {
            meta: SubmissionMeta {
                submitted_at,
                tracking: self.tracking.clone(),
            },
            answers: self.answers.as_map().clone(),
        }
    }

    fn submit_page(&self) -> u32 {
        self.config
            .submit_page
            .unwrap_or_else(|| self.schema.last_form_page())
    }

    fn on_submit_page(&self) -> bool {
        match self.current_step() {
            StepSpec::Form(form) => form.page == self.submit_page(),
            _ => false,
        }
    }

    fn after_navigation(&mut self) {
        self.banner = None;
        self.step_errors = StepValidation::default();
        self.seed_range_defaults();
        self.store.schedule_save(self.clock.now());
    }

    /// Range widgets render with the slider already positioned; mirror that
    /// by seeding the default as soon as the field is visible with no
    /// answer.
    fn seed_range_defaults(&mut self) {
        let StepSpec::Form(form) = &self.schema.steps[self.step_index] else {
            return;
        };
        let mut seeded = Vec::new();
        for field in &form.fields {
            if !matches!(field.kind, FieldKind::Range) {
                continue;
            }
            if !is_visible(field, &self.answers) {
                continue;
            }
            if self.answers.get(&field.id).is_some() {
                continue;
            }
            let start = field
                .default
                .clone()
                .or_else(|| field.min.map(number_value));
            if let Some(value) = start {
                seeded.push((field.id.clone(), value));
            }
        }
        for (id, value) in seeded {
            self.answers.set(&id, value);
        }
    }
}
