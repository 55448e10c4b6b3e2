use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// One logical storage slot per versioned storage key. Read is lenient by
/// contract: absence and unreadable content both surface as `None`.
pub trait SnapshotBackend: Send {
    fn read(&self) -> Option<String>;
    fn write(&mut self, raw: &str) -> Result<(), StorageError>;
    fn clear(&mut self) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write snapshot: {0}")]
    Write(#[source] io::Error),
    #[error("failed to clear snapshot: {0}")]
    Clear(#[source] io::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// In-memory slot for tests and headless embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn read(&self) -> Option<String> {
        self.slot.clone()
    }

    fn write(&mut self, raw: &str) -> Result<(), StorageError> {
        self.slot = Some(raw.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.slot = None;
        Ok(())
    }
}

/// One JSON file per storage key under a state directory.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>, storage_key: &str) -> Self {
        let file = format!("{}.json", storage_key.replace([':', '/'], "_"));
        Self {
            path: dir.as_ref().join(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotBackend for FileBackend {
    fn read(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    fn write(&mut self, raw: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(StorageError::Write)?;
        }
        fs::write(&self.path, raw).map_err(StorageError::Write)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::Clear(error)),
        }
    }
}

/// Platform default state directory for a form tag.
pub fn default_state_dir(tag: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", tag).map(|dirs| dirs.data_dir().to_path_buf())
}
