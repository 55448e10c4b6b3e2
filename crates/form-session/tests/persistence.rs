use serde_json::{Map, json};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use form_session::{FileBackend, SAVE_DEBOUNCE, Snapshot, SnapshotBackend, SnapshotStore};

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_754_000_000).unwrap()
}

fn snapshot(version: &str, saved_at: OffsetDateTime) -> Snapshot {
    let mut answers = Map::new();
    answers.insert("company".into(), json!("Acme"));
    Snapshot {
        schema_version: version.into(),
        step_index: 3,
        answers,
        tracking: None,
        rate_limit_until: 0,
        updated_at: saved_at.format(&Rfc3339).unwrap(),
    }
}

#[test]
fn file_backend_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileBackend::new(dir.path(), "audit:v1");

    assert!(backend.read().is_none());
    backend.write(r#"{"probe":true}"#).unwrap();
    assert_eq!(backend.read().as_deref(), Some(r#"{"probe":true}"#));

    backend.clear().unwrap();
    assert!(backend.read().is_none());
    // clearing an already-empty slot is fine
    backend.clear().unwrap();
}

#[test]
fn file_backend_keys_do_not_leak_path_separators() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(dir.path(), "audit:v1");
    let name = backend.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, "audit_v1.json");
}

#[test]
fn load_valid_round_trips_matching_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::new(FileBackend::new(dir.path(), "audit:v1"));

    let written = snapshot("1.0", now());
    store.write_now(&written).unwrap();

    let loaded = store.load_valid("1.0", now()).unwrap();
    assert_eq!(loaded, written);
}

#[test]
fn load_valid_clears_expired_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::new(FileBackend::new(dir.path(), "audit:v1"));

    store
        .write_now(&snapshot("1.0", now() - Duration::days(40)))
        .unwrap();

    assert!(store.load_valid("1.0", now()).is_none());
    // storage was cleared, not just skipped
    assert!(store.load_raw().is_none());
}

#[test]
fn load_valid_clears_version_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::new(FileBackend::new(dir.path(), "audit:v1"));

    store.write_now(&snapshot("0.9", now())).unwrap();

    assert!(store.load_valid("1.0", now()).is_none());
    assert!(store.load_raw().is_none());
}

#[test]
fn malformed_content_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileBackend::new(dir.path(), "audit:v1");
    backend.write("{broken").unwrap();

    let store = SnapshotStore::new(backend);
    assert!(store.load_raw().is_none());
}

#[test]
fn debounced_flush_writes_once_after_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::new(FileBackend::new(dir.path(), "audit:v1"));
    let state = snapshot("1.0", now());

    store.schedule_save(now());
    assert!(store.save_pending());

    // inside the window: nothing written yet
    let early = now() + Duration::milliseconds(100);
    assert!(!store.flush_due(&state, early).unwrap());
    assert!(store.load_raw().is_none());

    let late = now() + Duration::milliseconds(SAVE_DEBOUNCE.as_millis() as i64);
    assert!(store.flush_due(&state, late).unwrap());
    assert!(!store.save_pending());
    assert!(store.load_raw().is_some());

    // the deadline fired; it does not fire again
    assert!(!store.flush_due(&state, late + Duration::seconds(1)).unwrap());
}

#[test]
fn flush_now_bypasses_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SnapshotStore::new(FileBackend::new(dir.path(), "audit:v1"));
    let state = snapshot("1.0", now());

    assert!(!store.flush_now(&state).unwrap());

    store.schedule_save(now());
    assert!(store.flush_now(&state).unwrap());
    assert!(store.load_raw().is_some());
    assert!(!store.save_pending());
}
