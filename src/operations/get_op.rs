//! Read request builders.

use chrono::{DateTime, Utc};

use crate::engine::{BitemporalEngine, History};
use crate::entity::{EntityId, EntityVersion};
use crate::error::{BitempoResult, ValidationError};
use crate::time::TxRange;

/// Builder for point lookups.
///
/// # Example
/// ```rust,ignore
/// let version = GetBuilder::new("acct-1")
///     .valid_at(june)
///     .as_of(august)
///     .build()?
///     .execute(&engine)?;
/// ```
#[derive(Debug, Clone)]
pub struct GetBuilder {
    id: String,
    valid_at: Option<DateTime<Utc>>,
    as_of: Option<DateTime<Utc>>,
}

impl GetBuilder {
    /// Starts a lookup of `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            valid_at: None,
            as_of: None,
        }
    }

    /// Valid-time instant to look at (default: now).
    #[must_use]
    pub fn valid_at(mut self, time: DateTime<Utc>) -> Self {
        self.valid_at = Some(time);
        self
    }

    /// Transaction-time bound: only versions known by `time` (default: now).
    #[must_use]
    pub fn as_of(mut self, time: DateTime<Utc>) -> Self {
        self.as_of = Some(time);
        self
    }

    /// Returns `ValidationError::EmptyEntityId` if the id is empty.
    pub fn build(self) -> Result<GetRequest, ValidationError> {
        Ok(GetRequest {
            id: EntityId::new(self.id)?,
            valid_at: self.valid_at,
            as_of: self.as_of,
        })
    }

    /// Shorthand for `build()?.execute(engine)`.
    pub fn execute(self, engine: &BitemporalEngine) -> BitempoResult<Option<EntityVersion>> {
        self.build()?.execute(engine)
    }
}

/// A validated point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    /// Entity to look up.
    pub id: EntityId,
    /// Valid-time instant; `None` means the clock reading.
    pub valid_at: Option<DateTime<Utc>>,
    /// Transaction-time bound; `None` means the clock reading.
    pub as_of: Option<DateTime<Utc>>,
}

impl GetRequest {
    /// Runs the lookup against `engine`.
    pub fn execute(&self, engine: &BitemporalEngine) -> BitempoResult<Option<EntityVersion>> {
        engine.get(&self.id, self.valid_at, self.as_of)
    }
}

/// Builder for history reads over a transaction-time window.
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    id: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl HistoryBuilder {
    /// Starts a history read of `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: None,
            end: None,
        }
    }

    /// Window `[start, end)` over `known_at`. Unset bounds default to the
    /// start and end of representable time.
    #[must_use]
    pub fn known_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Inclusive lower bound on `known_at`.
    #[must_use]
    pub fn known_since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Exclusive upper bound on `known_at`.
    #[must_use]
    pub fn known_before(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Returns `EmptyEntityId` for an empty id and `InvalidTimeRange` for an
    /// empty or inverted window.
    pub fn build(self) -> Result<HistoryRequest, ValidationError> {
        let id = EntityId::new(self.id)?;
        let all = TxRange::all();
        let window = TxRange::new(
            self.start.unwrap_or_else(|| all.start()),
            self.end.unwrap_or_else(|| all.end()),
        )?;
        Ok(HistoryRequest { id, window })
    }

    /// Shorthand for `build()?.execute(engine)`.
    pub fn execute(self, engine: &BitemporalEngine) -> BitempoResult<History> {
        self.build()?.execute(engine)
    }
}

/// A validated history read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Entity whose history is read.
    pub id: EntityId,
    /// Transaction-time window `[start, end)`.
    pub window: TxRange,
}

impl HistoryRequest {
    /// Runs the read against `engine`.
    pub fn execute(&self, engine: &BitemporalEngine) -> BitempoResult<History> {
        engine.history(&self.id, self.window)
    }
}
