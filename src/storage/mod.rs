//! Storage layer for bitempo.
//!
//! [`VersionStore`] is the whole contract between the engine and a backend.
//! Two backends ship with the crate:
//! - [`InMemoryVersionStore`] for embedded use and tests
//! - `persistent::PersistentVersionStore` (feature `persistent`), a durable log

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryVersionStore;
pub use traits::{KnownAtBound, StorageError, VersionFilter, VersionStore};

#[cfg(feature = "persistent")]
pub use persistent::{open_store, PersistentConfig, PersistentVersionStore};
