//! # bitempo - append-only bitemporal entity store
//!
//! bitempo tracks entities along two independent time axes and never
//! rewrites history: every write is a new version layered on top of what
//! was known before.
//!
//! ## Core Concepts
//!
//! - **Valid time**: the half-open interval `[from, until)` during which a
//!   version's attribute values hold in the modeled world
//! - **Transaction time** (`known_at`): when the system recorded the version
//! - **As-of query**: "what did we believe about `valid_at`, knowing only what
//!   had been recorded by `as_of`?" The version with the greatest `known_at`
//!   among those valid at `valid_at` and known by `as_of` is the answer
//! - **VersionStore**: the ordered-store contract the engine runs on
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bitempo::{BitemporalEngine, GetBuilder, InMemoryVersionStore, PutBuilder};
//! use chrono::{TimeZone, Utc};
//!
//! let engine = BitemporalEngine::new(Arc::new(InMemoryVersionStore::new()));
//! let jan = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
//! let jun = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
//! let jul = Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap();
//! let aug = Utc.with_ymd_and_hms(2020, 8, 1, 0, 0, 0).unwrap();
//!
//! PutBuilder::new("acct-1")
//!     .attribute("balance", 100)
//!     .valid_from(jan)
//!     .known_at(jan)
//!     .build()?
//!     .execute(&engine)?;
//!
//! // A correction recorded in July, effective since January.
//! PutBuilder::new("acct-1")
//!     .attribute("balance", 150)
//!     .valid_from(jan)
//!     .known_at(jul)
//!     .build()?
//!     .execute(&engine)?;
//!
//! let before = GetBuilder::new("acct-1").valid_at(jun).as_of(jun).build()?.execute(&engine)?;
//! let after = GetBuilder::new("acct-1").valid_at(jun).as_of(aug).build()?.execute(&engine)?;
//!
//! assert_eq!(before.unwrap().get("balance").and_then(|v| v.as_int()), Some(100));
//! assert_eq!(after.unwrap().get("balance").and_then(|v| v.as_int()), Some(150));
//! # Ok::<(), bitempo::BitempoError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod clock;
pub mod engine;
pub mod entity;
pub mod error;
pub mod operations;
pub mod storage;
pub mod time;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{BitemporalEngine, EngineConfig, History};
pub use entity::{Attributes, EntityId, EntityVersion, RESERVED_FIELDS};
pub use error::{BitempoError, BitempoResult, ValidationError};
pub use operations::{GetBuilder, HistoryBuilder, PutBuilder};
pub use storage::{InMemoryVersionStore, KnownAtBound, StorageError, VersionFilter, VersionStore};
pub use time::{TimeRange, TxRange, END_OF_TIME, START_OF_TIME};
pub use value::Value;
