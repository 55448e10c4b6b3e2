use std::time::Duration;

use time::OffsetDateTime;

use crate::snapshot::Snapshot;
use crate::storage::{SnapshotBackend, StorageError};

/// Debounce window collapsing rapid edits into one write.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Cancelable deferred flush. Each `schedule` supersedes the previous
/// deadline; `fire` triggers at most once per deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Debounce {
    deadline: Option<OffsetDateTime>,
}

impl Debounce {
    pub fn schedule(&mut self, at: OffsetDateTime) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn fire(&mut self, now: OffsetDateTime) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Persistence adapter: owns the storage slot plus the deferred-save state.
#[derive(Debug)]
pub struct SnapshotStore<B> {
    backend: B,
    debounce: Debounce,
}

impl<B: SnapshotBackend> SnapshotStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            debounce: Debounce::default(),
        }
    }

    /// Reads and parses the stored snapshot. Absence and malformed content
    /// both report `None`; storage corruption never propagates outward.
    pub fn load_raw(&self) -> Option<Snapshot> {
        let raw = self.backend.read()?;
        serde_json::from_str(&raw).ok()
    }

    /// Loads a snapshot still valid for `schema_version`. A snapshot past
    /// its retention window or written under a different schema version is
    /// cleared and reported absent.
    pub fn load_valid(&mut self, schema_version: &str, now: OffsetDateTime) -> Option<Snapshot> {
        let snapshot = self.load_raw()?;
        let stale = snapshot.is_expired(now);
        let mismatched = snapshot.schema_version != schema_version;
        if stale || mismatched {
            if stale {
                tracing::debug!("snapshot discarded: past retention window");
            } else {
                tracing::debug!(
                    stored = %snapshot.schema_version,
                    live = %schema_version,
                    "snapshot discarded: schema version changed",
                );
            }
            if let Err(error) = self.backend.clear() {
                tracing::warn!(%error, "failed to clear invalidated snapshot");
            }
            return None;
        }
        Some(snapshot)
    }

    /// Schedules a debounced save; supersedes any pending one.
    pub fn schedule_save(&mut self, now: OffsetDateTime) {
        self.debounce.schedule(now + SAVE_DEBOUNCE);
    }

    pub fn save_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Writes the snapshot once the debounce window has elapsed. Returns
    /// true when a write happened, the cue for a transient save indicator.
    pub fn flush_due(&mut self, snapshot: &Snapshot, now: OffsetDateTime) -> Result<bool, StorageError> {
        if !self.debounce.fire(now) {
            return Ok(false);
        }
        self.write_now(snapshot)?;
        Ok(true)
    }

    /// Flushes a pending save immediately, bypassing the debounce window.
    pub fn flush_now(&mut self, snapshot: &Snapshot) -> Result<bool, StorageError> {
        if !self.debounce.is_pending() {
            return Ok(false);
        }
        self.debounce.cancel();
        self.write_now(snapshot)?;
        Ok(true)
    }

    /// Unconditional write.
    pub fn write_now(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let raw = serde_json::to_string(snapshot)?;
        self.backend.write(&raw)?;
        tracing::debug!(step = snapshot.step_index, "snapshot persisted");
        Ok(())
    }

    /// Drops the stored snapshot and cancels any pending save.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.debounce.cancel();
        self.backend.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }

    #[test]
    fn reschedule_supersedes_pending_deadline() {
        let mut debounce = Debounce::default();
        debounce.schedule(at(10));
        debounce.schedule(at(20));

        assert!(!debounce.fire(at(15)));
        assert!(debounce.fire(at(20)));
        assert!(!debounce.fire(at(25)));
    }

    #[test]
    fn cancel_clears_the_deadline() {
        let mut debounce = Debounce::default();
        debounce.schedule(at(10));
        debounce.cancel();
        assert!(!debounce.is_pending());
        assert!(!debounce.fire(at(30)));
    }
}
