//! Persistent key-value surface backing the session cache.
//!
//! The contract is small: string keys, string values, per-key atomicity.
//! Nothing above this layer assumes multi-key transactions.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

/// Errors from the key-value surface.
#[derive(Debug, Error)]
pub enum KvError {
    /// Reading a key failed for a reason other than absence.
    #[error("failed to read key {key}: {source}")]
    Read {
        /// Key being read.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Writing a key failed.
    #[error("failed to write key {key}: {source}")]
    Write {
        /// Key being written.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Removing a key failed for a reason other than absence.
    #[error("failed to remove key {key}: {source}")]
    Remove {
        /// Key being removed.
        key: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

/// String key-value store with per-key atomic writes.
pub trait KvStore: Send + Sync {
    /// Read a key, `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Read` when the key exists but cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a key. The value is fully written or not written at all.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Write` when persisting fails.
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Remove` when the key exists but cannot be removed.
    fn remove(&self, key: &str) -> Result<(), KvError>;
}

/// File-backed store: one file per key under a namespace directory.
///
/// Writes go to a temp file, are fsynced, then renamed over the final
/// path, so a crash mid-write leaves either the old value or none.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvError::Read {
                key: key.to_owned(),
                source: e,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let write_err = |e: std::io::Error| KvError::Write {
            key: key.to_owned(),
            source: e,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        let final_path = self.path_for(key);
        let temp_path = self.dir.join(format!("{key}.tmp.{}", std::process::id()));

        // Write to temp file with explicit sync
        {
            let mut file = fs::File::create(&temp_path).map_err(write_err)?;
            file.write_all(value.as_bytes()).map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
        }

        // Atomic rename
        fs::rename(&temp_path, &final_path).map_err(|e| {
            // Clean up temp file on failure
            let _ = fs::remove_file(&temp_path);
            write_err(e)
        })
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KvError::Remove {
                key: key.to_owned(),
                source: e,
            }),
        }
    }
}

/// In-memory store for tests and shells without persistence.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
