pub mod clock;
pub mod persist;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod submit;
pub mod tracking;

#[cfg(feature = "http")]
pub mod client;

pub use clock::{Clock, SystemClock};
pub use persist::{Debounce, SAVE_DEBOUNCE, SnapshotStore};
pub use session::{Controls, NextControl, Session, SessionConfig, SessionError, SubmitState};
pub use snapshot::{SNAPSHOT_TTL_DAYS, Snapshot};
pub use storage::{FileBackend, MemoryBackend, SnapshotBackend, StorageError, default_state_dir};
pub use submit::{
    CODE_BAD_RESPONSE, CODE_RATE_LIMIT, SUBMIT_TIMEOUT, SubmissionClient, SubmissionMeta,
    SubmissionRequest, SubmitOutcome, TransportError, interpret_response,
};
pub use tracking::{CampaignParams, TrackingContext};

#[cfg(feature = "http")]
pub use client::WebhookClient;
