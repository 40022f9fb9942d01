//! Persistent storage backend for bitempo.
//!
//! Durable, crash-safe storage with:
//! - an append-only write-ahead log, one frame per version
//! - CRC32 checksums for corruption detection
//! - an exclusive directory lock for single-process access
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            PersistentVersionStore            │
//! ├──────────────────────────────────────────────┤
//! │  insert ──► WriteAheadLog ──► read index     │
//! │             (versions.wal)    (in-memory)    │
//! │  find_* ───────────────────────►┘            │
//! │                                              │
//! │             FileLock (<dir>/.lock)           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! There is no compaction: the log only grows, matching the append-only
//! contract of the store.

mod codec;
mod file_lock;
mod store;
mod wal;

pub use file_lock::FileLock;
pub use store::{PersistentVersionStore, WAL_FILE};
pub use wal::{WalEntry, WriteAheadLog};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Configuration for persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether to fsync after every append (slower but safer).
    pub sync_on_write: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}

/// Open or create a persistent store at the given directory.
///
/// # Errors
/// - If the directory cannot be created or accessed
/// - If another process holds the lock
/// - If an intact log entry does not decode to a valid version
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use bitempo::{BitemporalEngine, storage::persistent::open_store};
///
/// let store = open_store("./ledger.btmp", None)?;
/// let engine = BitemporalEngine::new(Arc::new(store));
/// ```
pub fn open_store(
    dir: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentVersionStore, StorageError> {
    PersistentVersionStore::open(dir.as_ref(), &config.unwrap_or_default())
}
