//! Abstract storage contract for bitempo.
//!
//! The engine only ever appends and scans. A backend has to answer:
//! - `insert`: durably append one version
//! - `find_one` / `find_many`: filter by entity id, a transaction-time bound,
//!   and optionally valid-time containment, ordered by `known_at` descending
//!
//! Backends are expected to keep an index on `(entity id, known_at, valid_from)`
//! so that `find_one` does not scan an entity's whole history.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::{EntityId, EntityVersion};
use crate::time::TxRange;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O failure in a durable backend.
    #[error("I/O error: {0}")]
    Io(String),

    /// Another process holds the store.
    #[error("Store is locked: {0}")]
    Locked(String),
}

/// Transaction-time restriction of a [`VersionFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownAtBound {
    /// `known_at <= t`.
    AtOrBefore(DateTime<Utc>),
    /// `known_at` inside the half-open window.
    Within(TxRange),
}

impl KnownAtBound {
    /// True if `known_at` satisfies the bound.
    #[must_use]
    pub fn admits(&self, known_at: DateTime<Utc>) -> bool {
        match self {
            Self::AtOrBefore(t) => known_at <= *t,
            Self::Within(range) => range.contains(known_at),
        }
    }
}

/// Filter passed to the store's find operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFilter {
    /// Only versions of this entity.
    pub id: EntityId,
    /// Transaction-time restriction.
    pub known_at: KnownAtBound,
    /// If set, only versions whose valid interval contains this instant.
    pub valid_at: Option<DateTime<Utc>>,
}

impl VersionFilter {
    /// Filter for a point lookup: known by `as_of`, valid at `valid_at`.
    #[must_use]
    pub const fn as_of(id: EntityId, valid_at: DateTime<Utc>, as_of: DateTime<Utc>) -> Self {
        Self {
            id,
            known_at: KnownAtBound::AtOrBefore(as_of),
            valid_at: Some(valid_at),
        }
    }

    /// Filter for a history read over a transaction-time window.
    #[must_use]
    pub const fn known_within(id: EntityId, window: TxRange) -> Self {
        Self {
            id,
            known_at: KnownAtBound::Within(window),
            valid_at: None,
        }
    }

    /// True if `version` satisfies every part of the filter.
    #[must_use]
    pub fn matches(&self, version: &EntityVersion) -> bool {
        version.id() == &self.id
            && self.known_at.admits(version.known_at())
            && self.valid_at.map_or(true, |t| version.is_valid_at(t))
    }
}

/// Storage trait for bitemporal versions.
///
/// Results of `find_one` and `find_many` are ordered by `known_at`
/// descending; versions sharing a `known_at` come back most recently
/// inserted first.
///
/// # Safety Considerations
/// - `insert` must be atomic for a single version
/// - Implementations must tolerate concurrent callers
/// - No method may update or remove a stored version
pub trait VersionStore: Send + Sync {
    /// Append a version.
    fn insert(&self, version: EntityVersion) -> Result<(), StorageError>;

    /// Return the matching version with the greatest `known_at`, if any.
    fn find_one(&self, filter: &VersionFilter) -> Result<Option<EntityVersion>, StorageError> {
        Ok(self.find_many(filter, 1)?.into_iter().next())
    }

    /// Return up to `limit` matching versions, newest `known_at` first.
    fn find_many(
        &self,
        filter: &VersionFilter,
        limit: usize,
    ) -> Result<Vec<EntityVersion>, StorageError>;

    /// Make sure the `(entity id, known_at, valid_from)` index exists.
    ///
    /// Backends whose layout already is that index can keep the default.
    fn ensure_index(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
