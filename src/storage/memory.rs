//! In-memory storage backend.
//!
//! Thread-safe implementation of [`VersionStore`]. It is intended for embedded
//! usage, tests, and as the read index of the persistent backend.
//!
//! Layout: per entity id, a `BTreeMap` keyed by `(known_at, seq)`. That map is
//! the `(entity id, known_at)` index: point lookups walk it backwards from the
//! as-of bound and stop at the first version whose valid interval matches.
//! `seq` is a store-wide insertion counter that keeps versions sharing a
//! `known_at` apart and orders them by arrival.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::entity::{EntityId, EntityVersion};
use crate::storage::traits::{KnownAtBound, StorageError, VersionFilter, VersionStore};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

type VersionKey = (DateTime<Utc>, u64);

#[derive(Debug, Default)]
struct VersionState {
    by_id: HashMap<EntityId, BTreeMap<VersionKey, EntityVersion>>,
    next_seq: u64,
    total: usize,
}

/// Thread-safe in-memory version store.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    state: RwLock<VersionState>,
}

impl VersionState {
    fn index(&mut self, version: EntityVersion, seq: u64) -> Result<(), StorageError> {
        let key = (version.known_at(), seq);
        let versions = self.by_id.entry(version.id().clone()).or_default();
        if versions.contains_key(&key) {
            return Err(StorageError::Backend(format!(
                "duplicate version sequence {seq} for {}",
                version.id()
            )));
        }
        versions.insert(key, version);
        self.next_seq = self.next_seq.max(
            seq.checked_add(1)
                .ok_or_else(|| StorageError::Backend("version sequence exhausted".to_string()))?,
        );
        self.total += 1;
        Ok(())
    }
}

impl InMemoryVersionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored versions across all entities.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("version.len"))?;
        Ok(state.total)
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Insert with a caller-assigned sequence as the equal-`known_at` tie-break.
    ///
    /// Used by durable backends so that versions sharing a `known_at` are
    /// ordered by their position in the log, whatever order they reach the
    /// index in. Sequences must be unique per store.
    pub(crate) fn insert_sequenced(
        &self,
        version: EntityVersion,
        seq: u64,
    ) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("version.insert_sequenced"))?;
        state.index(version, seq)
    }

    /// Number of stored versions of one entity.
    pub fn count_versions(&self, id: &EntityId) -> Result<usize, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("version.count_versions"))?;
        Ok(state.by_id.get(id).map_or(0, BTreeMap::len))
    }
}

fn known_at_range(bound: KnownAtBound) -> (Bound<VersionKey>, Bound<VersionKey>) {
    match bound {
        KnownAtBound::AtOrBefore(t) => (Bound::Unbounded, Bound::Included((t, u64::MAX))),
        KnownAtBound::Within(window) => (
            Bound::Included((window.start(), 0)),
            Bound::Excluded((window.end(), 0)),
        ),
    }
}

impl VersionStore for InMemoryVersionStore {
    fn insert(&self, version: EntityVersion) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("version.insert"))?;
        let seq = state.next_seq;
        state.index(version, seq)
    }

    fn find_many(
        &self,
        filter: &VersionFilter,
        limit: usize,
    ) -> Result<Vec<EntityVersion>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().map_err(|_| lock_err("version.find_many"))?;
        let Some(versions) = state.by_id.get(&filter.id) else {
            return Ok(Vec::new());
        };

        Ok(versions
            .range(known_at_range(filter.known_at))
            .rev()
            .map(|(_, v)| v)
            .filter(|v| filter.valid_at.map_or(true, |t| v.is_valid_at(t)))
            .take(limit)
            .cloned()
            .collect())
    }
}
