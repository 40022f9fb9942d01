//! Durable [`VersionStore`] backed by the write-ahead log.
//!
//! Reads are served from an [`InMemoryVersionStore`] rebuilt by replaying the
//! log on open; every insert is logged before it is indexed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::entity::EntityVersion;
use crate::storage::memory::InMemoryVersionStore;
use crate::storage::traits::{StorageError, VersionFilter, VersionStore};

use super::file_lock::FileLock;
use super::wal::WriteAheadLog;
use super::PersistentConfig;

/// Log file name inside the store directory.
pub const WAL_FILE: &str = "versions.wal";

fn io_err(context: &str, err: &std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::WouldBlock => StorageError::Locked(format!("{context}: {err}")),
        ErrorKind::InvalidData => StorageError::Serialization(format!("{context}: {err}")),
        _ => StorageError::Io(format!("{context}: {err}")),
    }
}

/// Durable, single-process version store.
#[derive(Debug)]
pub struct PersistentVersionStore {
    dir: PathBuf,
    _lock: FileLock,
    wal: WriteAheadLog,
    index: InMemoryVersionStore,
}

impl PersistentVersionStore {
    /// Opens (or creates) the store in `dir`, replaying its log.
    ///
    /// # Errors
    /// - `StorageError::Locked` if another process has the directory open
    /// - `StorageError::Io` on filesystem failures
    /// - `StorageError::Serialization` if the log header is not a bitempo log,
    ///   an entry before the final one is damaged, or an intact entry is not
    ///   a valid version. The log file is left as it was.
    pub fn open(dir: &Path, config: &PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|e| io_err("failed to create store directory", &e))?;
        let lock = FileLock::acquire(dir).map_err(|e| io_err("failed to acquire lock", &e))?;

        let (wal, entries) = WriteAheadLog::open(&dir.join(WAL_FILE), config.sync_on_write)
            .map_err(|e| io_err("failed to open write-ahead log", &e))?;

        let index = InMemoryVersionStore::new();
        let replayed = entries.len();
        for entry in entries {
            let version = EntityVersion::from_record(entry.record).map_err(|e| {
                StorageError::Serialization(format!("log entry {}: {e}", entry.sequence))
            })?;
            index.insert_sequenced(version, entry.sequence)?;
        }

        info!(dir = %dir.display(), replayed, "opened persistent version store");

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            wal,
            index,
        })
    }

    /// Store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total number of stored versions.
    pub fn len(&self) -> Result<usize, StorageError> {
        self.index.len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.index.is_empty()
    }

    /// Size of the write-ahead log in bytes.
    pub fn log_size_bytes(&self) -> Result<u64, StorageError> {
        self.wal
            .size_bytes()
            .map_err(|e| io_err("failed to stat write-ahead log", &e))
    }
}

impl VersionStore for PersistentVersionStore {
    fn insert(&self, version: EntityVersion) -> Result<(), StorageError> {
        let sequence = self
            .wal
            .append(version.to_record())
            .map_err(|e| io_err("failed to append to write-ahead log", &e))?;
        debug!(sequence, entity_id = %version.id(), "logged version");
        // Keyed by log position so equal `known_at` resolves the same way
        // after a replay.
        self.index.insert_sequenced(version, sequence)
    }

    fn find_one(&self, filter: &VersionFilter) -> Result<Option<EntityVersion>, StorageError> {
        self.index.find_one(filter)
    }

    fn find_many(
        &self,
        filter: &VersionFilter,
        limit: usize,
    ) -> Result<Vec<EntityVersion>, StorageError> {
        self.index.find_many(filter, limit)
    }
}
