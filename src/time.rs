//! Temporal types for bitemporal data management.
//!
//! Two independent axes:
//! - **Valid Time**: when a fact is true in the modeled world ([`TimeRange`]).
//! - **Transaction Time**: when the system recorded the fact (`known_at`,
//!   windowed by [`TxRange`]).
//!
//! Both ranges are half-open: `[from, until)`.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Earliest representable instant (`0001-01-01T00:00:00Z`).
pub static START_OF_TIME: LazyLock<DateTime<Utc>> = LazyLock::new(|| {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |naive| naive.and_utc())
});

/// Latest representable instant (`9999-12-31T23:59:59.999999Z`).
pub static END_OF_TIME: LazyLock<DateTime<Utc>> = LazyLock::new(|| {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
        .map_or(DateTime::<Utc>::MAX_UTC, |naive| naive.and_utc())
});

// Deserialization goes through the validating constructors.
#[derive(Deserialize)]
struct RawRange {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TryFrom<RawRange> for TimeRange {
    type Error = ValidationError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.until)
    }
}

#[derive(Deserialize)]
struct RawTxRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTxRange> for TxRange {
    type Error = ValidationError;

    fn try_from(raw: RawTxRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// A valid-time interval (half-open: `[from, until)`).
///
/// The interval is never empty: construction rejects `from >= until`.
///
/// # Examples
///
/// ```
/// use bitempo::TimeRange;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let range = TimeRange::new(now, now + Duration::hours(1)).unwrap();
///
/// assert!(range.contains(now));
/// assert!(!range.contains(now + Duration::hours(1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct TimeRange {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a time range from two timestamps.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `from >= until`.
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, ValidationError> {
        if from >= until {
            return Err(ValidationError::InvalidTimeRange { from, to: until });
        }
        Ok(Self { from, until })
    }

    /// Creates a range from `from` to the end of representable time.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `from` is at or past `END_OF_TIME`.
    pub fn starting_at(from: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(from, *END_OF_TIME)
    }

    /// Creates a range from the start of representable time up to `until`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `until` is at or before `START_OF_TIME`.
    pub fn ending_at(until: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(*START_OF_TIME, until)
    }

    /// The range covering all representable time.
    #[must_use]
    pub fn forever() -> Self {
        Self {
            from: *START_OF_TIME,
            until: *END_OF_TIME,
        }
    }

    /// Start of the range (inclusive).
    #[must_use]
    pub const fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// End of the range (exclusive).
    #[must_use]
    pub const fn until(&self) -> DateTime<Utc> {
        self.until
    }

    /// True if the range starts at `START_OF_TIME`.
    #[must_use]
    pub fn is_unbounded_start(&self) -> bool {
        self.from == *START_OF_TIME
    }

    /// True if the range runs to `END_OF_TIME`.
    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.until == *END_OF_TIME
    }

    /// Check if a timestamp falls within this range `[from, until)`.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.from && time < self.until
    }

    /// True if the two ranges share an instant.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.from < other.until && other.from < self.until
    }

    /// Returns the intersection of two ranges, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            from: self.from.max(other.from),
            until: self.until.min(other.until),
        })
    }

    /// Length of the range.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.until - self.from
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::forever()
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{} → ∞)", self.from)
        } else {
            write!(f, "[{} → {})", self.from, self.until)
        }
    }
}

/// A transaction-time window (half-open: `[start, end)`) over `known_at`.
///
/// Used by history reads to select every version recorded inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTxRange")]
pub struct TxRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TxRange {
    /// Creates a transaction-time window.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange {
                from: start,
                to: end,
            });
        }
        Ok(Self { start, end })
    }

    /// The window covering every possible `known_at`.
    #[must_use]
    pub fn all() -> Self {
        Self {
            start: *START_OF_TIME,
            end: *END_OF_TIME,
        }
    }

    /// Start of the window (inclusive).
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the window (exclusive).
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Check if `known_at` falls within `[start, end)`.
    #[must_use]
    pub fn contains(&self, known_at: DateTime<Utc>) -> bool {
        known_at >= self.start && known_at < self.end
    }
}

impl std::fmt::Display for TxRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} → {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_time_range_new_valid() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let range = TimeRange::new(now, later).unwrap();

        assert_eq!(range.from(), now);
        assert_eq!(range.until(), later);
        assert!(!range.is_open_ended());
    }

    #[test]
    fn test_time_range_new_invalid() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);

        assert!(TimeRange::new(now, earlier).is_err());
        assert!(TimeRange::new(now, now).is_err()); // Empty interval is invalid
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(START_OF_TIME.to_rfc3339(), "0001-01-01T00:00:00+00:00");
        assert!(END_OF_TIME.to_rfc3339().starts_with("9999-12-31T23:59:59.999999"));
        assert!(*START_OF_TIME < *END_OF_TIME);
    }

    #[test]
    fn test_time_range_forever() {
        let range = TimeRange::forever();
        assert!(range.is_open_ended());
        assert!(range.is_unbounded_start());
        assert!(range.contains(Utc::now()));
        assert!(range.contains(*START_OF_TIME));
        assert!(!range.contains(*END_OF_TIME));
    }

    #[test]
    fn test_time_range_starting_at_and_until() {
        let t = at(2020, 1, 1);
        let open = TimeRange::starting_at(t).unwrap();
        assert!(open.is_open_ended());
        assert_eq!(open.from(), t);

        let closed = TimeRange::ending_at(t).unwrap();
        assert!(closed.is_unbounded_start());
        assert!(!closed.contains(t));

        assert!(TimeRange::starting_at(*END_OF_TIME).is_err());
        assert!(TimeRange::ending_at(*START_OF_TIME).is_err());
    }

    #[test]
    fn test_time_range_contains_is_half_open() {
        let start = at(2020, 1, 1);
        let end = at(2021, 1, 1);
        let range = TimeRange::new(start, end).unwrap();

        assert!(range.contains(start)); // Inclusive start
        assert!(range.contains(at(2020, 6, 1)));
        assert!(!range.contains(end)); // Exclusive end
        assert!(!range.contains(at(2019, 12, 31)));
    }

    #[test]
    fn test_time_range_overlaps() {
        let r1 = TimeRange::new(at(2020, 1, 1), at(2020, 3, 1)).unwrap();
        let r2 = TimeRange::new(at(2020, 2, 1), at(2020, 4, 1)).unwrap();
        let r3 = TimeRange::new(at(2020, 3, 1), at(2020, 5, 1)).unwrap();

        assert!(r1.overlaps(&r2));
        assert!(r2.overlaps(&r1));
        // Touching ranges do not overlap.
        assert!(!r1.overlaps(&r3));
        assert!(!r3.overlaps(&r1));
    }

    #[test]
    fn test_time_range_intersection() {
        let r1 = TimeRange::new(at(2020, 1, 1), at(2020, 4, 1)).unwrap();
        let r2 = TimeRange::new(at(2020, 2, 1), at(2020, 5, 1)).unwrap();

        let i = r1.intersection(&r2).unwrap();
        assert_eq!(i.from(), at(2020, 2, 1));
        assert_eq!(i.until(), at(2020, 4, 1));

        let r3 = TimeRange::new(at(2021, 1, 1), at(2021, 2, 1)).unwrap();
        assert!(r1.intersection(&r3).is_none());
    }

    #[test]
    fn test_time_range_duration() {
        let now = Utc::now();
        let range = TimeRange::new(now, now + Duration::hours(2)).unwrap();
        assert_eq!(range.duration(), Duration::hours(2));
    }

    #[test]
    fn test_time_range_display() {
        let display = format!("{}", TimeRange::forever());
        assert!(display.contains("→"));
        assert!(display.contains("∞"));
    }

    #[test]
    fn test_time_range_serialization() {
        let range = TimeRange::new(at(2020, 1, 1), at(2021, 1, 1)).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(range, back);
    }

    #[test]
    fn test_time_range_deserialize_rejects_empty_interval() {
        let json = r#"{"from":"2020-01-01T00:00:00Z","until":"2020-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeRange>(json).is_err());
    }

    #[test]
    fn test_tx_range() {
        let window = TxRange::new(at(2020, 1, 1), at(2020, 12, 31)).unwrap();
        assert!(window.contains(at(2020, 1, 1)));
        assert!(window.contains(at(2020, 7, 1)));
        assert!(!window.contains(at(2020, 12, 31)));

        assert!(TxRange::new(at(2020, 1, 1), at(2020, 1, 1)).is_err());
        assert!(TxRange::all().contains(Utc::now()));
    }
}
