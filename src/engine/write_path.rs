//! Engine write path.
//!
//! `put` is a blind append: it never reads, merges, splits, or rewrites an
//! existing version. Overlap with earlier valid intervals is expected; the
//! read path resolves it by preferring the latest `known_at`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entity::{Attributes, EntityVersion};
use crate::error::BitempoResult;
use crate::time::TimeRange;

use super::{parse_id, BitemporalEngine};

impl BitemporalEngine {
    /// Appends a new version of `id`.
    ///
    /// `known_at` defaults to the engine clock's current reading. The
    /// returned version echoes the inputs; `valid_time` is stored as given.
    ///
    /// # Errors
    /// - `ValidationError::EmptyEntityId` for an empty id
    /// - `BitempoError::Storage` if the append fails; nothing is written in that case
    pub fn put(
        &self,
        id: impl AsRef<str>,
        values: Attributes,
        valid_time: TimeRange,
        known_at: Option<DateTime<Utc>>,
    ) -> BitempoResult<EntityVersion> {
        let id = parse_id(id.as_ref())?;
        let known_at = known_at.unwrap_or_else(|| self.clock.now());

        let version = EntityVersion::new(id, values, valid_time, known_at);
        self.store.insert(version.clone())?;

        debug!(
            entity_id = %version.id(),
            valid_time = %version.valid_time(),
            known_at = %version.known_at(),
            attributes = version.values().len(),
            "appended version"
        );
        Ok(version)
    }
}
