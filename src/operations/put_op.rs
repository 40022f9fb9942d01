//! Append request builder.

use chrono::{DateTime, Utc};

use crate::engine::BitemporalEngine;
use crate::entity::{Attributes, EntityId, EntityVersion};
use crate::error::{BitempoResult, ValidationError};
use crate::time::{TimeRange, END_OF_TIME, START_OF_TIME};
use crate::value::Value;

/// Builder for `put` requests.
///
/// Valid time defaults to `[START_OF_TIME, END_OF_TIME)`; `known_at`
/// defaults to the engine clock at execution.
///
/// # Example
/// ```rust,ignore
/// let version = PutBuilder::new("acct-1")
///     .attribute("balance", 150)
///     .valid_from(jan)
///     .known_at(july)
///     .build()?
///     .execute(&engine)?;
/// ```
#[derive(Debug, Clone)]
pub struct PutBuilder {
    id: String,
    attributes: Vec<(String, Value)>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    known_at: Option<DateTime<Utc>>,
}

impl PutBuilder {
    /// Starts an append for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
            valid_from: None,
            valid_until: None,
            known_at: None,
        }
    }

    /// Add an attribute. A repeated name keeps the last value.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Inclusive start of valid time.
    #[must_use]
    pub fn valid_from(mut self, time: DateTime<Utc>) -> Self {
        self.valid_from = Some(time);
        self
    }

    /// Exclusive end of valid time.
    #[must_use]
    pub fn valid_until(mut self, time: DateTime<Utc>) -> Self {
        self.valid_until = Some(time);
        self
    }

    /// Set both valid-time bounds from an existing range.
    #[must_use]
    pub fn valid_time(mut self, range: TimeRange) -> Self {
        self.valid_from = Some(range.from());
        self.valid_until = Some(range.until());
        self
    }

    /// Transaction time to record instead of the clock reading.
    #[must_use]
    pub fn known_at(mut self, time: DateTime<Utc>) -> Self {
        self.known_at = Some(time);
        self
    }

    /// Build the request.
    ///
    /// Returns `EmptyEntityId`, `EmptyAttributeName`, `ReservedAttribute`,
    /// or `InvalidTimeRange` (for `valid_from >= valid_until`).
    pub fn build(self) -> Result<PutRequest, ValidationError> {
        let id = EntityId::new(self.id)?;

        let mut values = Attributes::new();
        for (name, value) in self.attributes {
            values.insert(name, value)?;
        }

        let valid_time = TimeRange::new(
            self.valid_from.unwrap_or(*START_OF_TIME),
            self.valid_until.unwrap_or(*END_OF_TIME),
        )?;

        Ok(PutRequest {
            id,
            values,
            valid_time,
            known_at: self.known_at,
        })
    }
}

/// A validated append.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    /// Entity the version belongs to.
    pub id: EntityId,
    /// Attribute values to assert.
    pub values: Attributes,
    /// Valid-time interval, stored as given.
    pub valid_time: TimeRange,
    /// Transaction time; `None` means the clock reading.
    pub known_at: Option<DateTime<Utc>>,
}

impl PutRequest {
    /// Appends the version through `engine`.
    pub fn execute(self, engine: &BitemporalEngine) -> BitempoResult<EntityVersion> {
        engine.put(&self.id, self.values, self.valid_time, self.known_at)
    }
}
