//! Storage backends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use super::StorageError;

/// Where the store's entries live between runs.
pub trait StorageBackend: Send + Sync {
    /// Load all entries. A missing store is empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if existing data cannot be read.
    fn load(&self) -> Result<Map<String, Value>, StorageError>;

    /// Replace the stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be written.
    fn persist(&self, entries: &Map<String, Value>) -> Result<(), StorageError>;
}

/// Keeps nothing; used for tests and ephemeral sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        Ok(Map::new())
    }

    fn persist(&self, _entries: &Map<String, Value>) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A single JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A corrupt store starts over empty rather than blocking the storefront
                warn!(path = %self.path.display(), error = %e, "Local store is corrupt, starting empty");
                Ok(Map::new())
            }
        }
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
