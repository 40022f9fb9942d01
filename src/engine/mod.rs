//! Bitemporal query engine.
//!
//! A thin, deterministic layer over a [`VersionStore`]:
//! - `get` selects the one version valid at `valid_at` and freshest as of `as_of`
//! - `history` lists what was recorded inside a transaction-time window
//! - `put` (see `write_path`) appends a version
//!
//! The engine holds no mutable state, only handles to the store and clock, so
//! it can be cloned and shared across threads freely. Store failures are
//! passed through; the engine never retries.

mod config;
mod write_path;

pub use config::EngineConfig;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::entity::{EntityId, EntityVersion};
use crate::error::BitempoResult;
use crate::storage::{VersionFilter, VersionStore};
use crate::time::TxRange;

fn parse_id(id: &str) -> BitempoResult<EntityId> {
    Ok(EntityId::new(id)?)
}

/// Versions recorded inside a transaction-time window.
///
/// Ordered newest `known_at` first. `truncated` is set when more versions
/// matched than the engine's `history_limit` allowed it to return.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    /// Matching versions, newest `known_at` first.
    pub versions: Vec<EntityVersion>,
    /// True if more versions matched than were returned.
    pub truncated: bool,
}

impl History {
    /// Number of returned versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True if nothing in the window matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The most recently recorded version in the window.
    #[must_use]
    pub fn latest(&self) -> Option<&EntityVersion> {
        self.versions.first()
    }

    /// Iterates newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityVersion> {
        self.versions.iter()
    }
}

impl IntoIterator for History {
    type Item = EntityVersion;
    type IntoIter = std::vec::IntoIter<EntityVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a EntityVersion;
    type IntoIter = std::slice::Iter<'a, EntityVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}

/// Bitemporal query engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bitempo::{Attributes, BitemporalEngine, InMemoryVersionStore, TimeRange};
/// use chrono::{TimeZone, Utc};
///
/// let engine = BitemporalEngine::new(Arc::new(InMemoryVersionStore::new()));
/// let jan = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
/// let jun = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
///
/// engine.put(
///     "acct-1",
///     Attributes::new().with("balance", 100).unwrap(),
///     TimeRange::starting_at(jan).unwrap(),
///     Some(jan),
/// ).unwrap();
///
/// let found = engine.get("acct-1", Some(jun), Some(jun)).unwrap().unwrap();
/// assert_eq!(found.get("balance").and_then(|v| v.as_int()), Some(100));
/// ```
#[derive(Clone)]
pub struct BitemporalEngine {
    store: Arc<dyn VersionStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for BitemporalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitemporalEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BitemporalEngine {
    /// Create an engine over `store` using the wall clock and default config.
    #[must_use]
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    /// Replace the clock used for "now" defaults.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configuration after validating it.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the config is unusable.
    pub fn with_config(mut self, config: EngineConfig) -> BitempoResult<Self> {
        self.config = config.validate()?;
        Ok(self)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    /// Asks the store to build its `(entity id, known_at, valid_from)` index.
    ///
    /// Call once at startup against backends that do not create it on their own.
    pub fn ensure_index(&self) -> BitempoResult<()> {
        self.store.ensure_index()?;
        debug!("version index ensured");
        Ok(())
    }

    /// Current reading of the engine clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Point lookup: the version of `id` valid at `valid_at`, as known at `as_of`.
    ///
    /// Among versions with `known_at <= as_of` whose valid interval contains
    /// `valid_at`, the one with the greatest `known_at` wins. Omitted times
    /// default to a single clock reading taken at call time.
    ///
    /// The returned version carries its interval as originally recorded;
    /// corrections recorded after `as_of` are not reflected.
    ///
    /// # Errors
    /// - `ValidationError::EmptyEntityId` for an empty id
    /// - `BitempoError::Storage` if the store fails
    ///
    /// Finding nothing is `Ok(None)`.
    pub fn get(
        &self,
        id: impl AsRef<str>,
        valid_at: Option<DateTime<Utc>>,
        as_of: Option<DateTime<Utc>>,
    ) -> BitempoResult<Option<EntityVersion>> {
        let id = parse_id(id.as_ref())?;
        let (valid_at, as_of) = match (valid_at, as_of) {
            (Some(v), Some(a)) => (v, a),
            (v, a) => {
                let now = self.clock.now();
                (v.unwrap_or(now), a.unwrap_or(now))
            }
        };

        let filter = VersionFilter::as_of(id, valid_at, as_of);
        let found = self.store.find_one(&filter)?;

        debug!(
            entity_id = %filter.id,
            %valid_at,
            %as_of,
            found = found.is_some(),
            "bitemporal get"
        );
        Ok(found)
    }

    /// History read: every version of `id` recorded inside `window`,
    /// newest `known_at` first, with no valid-time filter.
    ///
    /// At most `config().history_limit` versions are returned; the
    /// `truncated` flag reports whether more existed.
    ///
    /// # Errors
    /// - `ValidationError::EmptyEntityId` for an empty id
    /// - `BitempoError::Storage` if the store fails
    pub fn history(&self, id: impl AsRef<str>, window: TxRange) -> BitempoResult<History> {
        let id = parse_id(id.as_ref())?;
        let limit = self.config.history_limit;

        let filter = VersionFilter::known_within(id, window);
        // One extra row tells us whether the cap cut anything off.
        let mut versions = self.store.find_many(&filter, limit.saturating_add(1))?;
        let truncated = versions.len() > limit;
        versions.truncate(limit);

        if truncated {
            warn!(
                entity_id = %filter.id,
                %window,
                limit,
                "history read truncated"
            );
        } else {
            debug!(
                entity_id = %filter.id,
                %window,
                returned = versions.len(),
                "history read"
            );
        }

        Ok(History {
            versions,
            truncated,
        })
    }
}
