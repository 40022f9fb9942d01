//! Entity identity and bitemporal versions.
//!
//! An [`EntityVersion`] is one immutable fact about an entity: a set of
//! attribute values, the valid-time interval they hold for, and the instant
//! the system learned them. Versions are only ever appended; a correction is
//! a newer version with a later `known_at`, never an edit.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::StorageError;
use crate::time::TimeRange;
use crate::value::Value;

/// Record field holding the entity id.
pub const ENTITY_ID_FIELD: &str = "entity-id";
/// Record field holding the inclusive start of valid time.
pub const VALID_FROM_FIELD: &str = "valid-from";
/// Record field holding the exclusive end of valid time.
pub const VALID_UNTIL_FIELD: &str = "valid-until";
/// Record field holding the transaction time.
pub const KNOWN_AT_FIELD: &str = "known-at";

/// Control fields every stored record carries. Attribute names may not use them.
pub const RESERVED_FIELDS: [&str; 4] = [
    ENTITY_ID_FIELD,
    VALID_FROM_FIELD,
    VALID_UNTIL_FIELD,
    KNOWN_AT_FIELD,
];

/// Stable identifier of the real-world object being tracked.
///
/// Never empty. The same id is shared by every version of the object.
///
/// # Examples
///
/// ```
/// use bitempo::EntityId;
///
/// let id = EntityId::new("acct-1").unwrap();
/// assert_eq!(id.as_str(), "acct-1");
/// assert!(EntityId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity id.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyEntityId` for an empty or whitespace-only id.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyEntityId);
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl TryFrom<&str> for EntityId {
    type Error = ValidationError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Checks that `name` is usable as an attribute name.
///
/// # Errors
///
/// `EmptyAttributeName` for an empty name, `ReservedAttribute` for a control field.
pub fn validate_attribute_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyAttributeName);
    }
    if RESERVED_FIELDS.contains(&name) {
        return Err(ValidationError::ReservedAttribute {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Checks a whole attribute: a usable name and a value with a JSON form.
fn validate_attribute(name: &str, value: &Value) -> Result<(), ValidationError> {
    validate_attribute_name(name)?;
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Attribute name → value map of a version.
///
/// Entries are validated on insert, so an `Attributes` never contains a
/// reserved field name or a NaN/infinite float.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    /// Empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an attribute, returning the previous value for that name.
    ///
    /// # Errors
    ///
    /// Fails if `name` is empty or reserved, or `value` is a non-finite float.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ValidationError> {
        let name = name.into();
        let value = value.into();
        validate_attribute(&name, &value)?;
        Ok(self.0.insert(name, value))
    }

    /// Builder-style insert.
    ///
    /// # Errors
    ///
    /// Fails if `name` is empty or reserved, or `value` is a non-finite float.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self, ValidationError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Value of `name`, if set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True if `name` is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl TryFrom<BTreeMap<String, Value>> for Attributes {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        for (name, value) in &map {
            validate_attribute(name, value)?;
        }
        Ok(Self(map))
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One immutable bitemporal version of an entity.
///
/// # Examples
///
/// ```
/// use bitempo::{Attributes, EntityId, EntityVersion, TimeRange};
/// use chrono::{TimeZone, Utc};
///
/// let known = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
/// let version = EntityVersion::new(
///     EntityId::new("acct-1").unwrap(),
///     Attributes::new().with("balance", 100).unwrap(),
///     TimeRange::starting_at(known).unwrap(),
///     known,
/// );
///
/// assert_eq!(version.get("balance").and_then(|v| v.as_int()), Some(100));
/// assert!(version.is_valid_at(known));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    id: EntityId,
    values: Attributes,
    valid_time: TimeRange,
    known_at: DateTime<Utc>,
}

impl EntityVersion {
    /// Assembles a version from already validated parts.
    #[must_use]
    pub const fn new(
        id: EntityId,
        values: Attributes,
        valid_time: TimeRange,
        known_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            values,
            valid_time,
            known_at,
        }
    }

    /// Entity this version belongs to.
    #[must_use]
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Attribute values asserted by this version.
    #[must_use]
    pub const fn values(&self) -> &Attributes {
        &self.values
    }

    /// Valid-time interval as it was recorded; later corrections never change it.
    #[must_use]
    pub const fn valid_time(&self) -> &TimeRange {
        &self.valid_time
    }

    /// When the system recorded this version.
    #[must_use]
    pub const fn known_at(&self) -> DateTime<Utc> {
        self.known_at
    }

    /// Shorthand for `values().get(name)`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// True if the version asserts validity at `time`.
    #[must_use]
    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.valid_time.contains(time)
    }

    /// True if the version had been recorded by `as_of`.
    #[must_use]
    pub fn is_known_as_of(&self, as_of: DateTime<Utc>) -> bool {
        self.known_at <= as_of
    }

    /// Flattens the version into a single record: attribute fields plus
    /// the four reserved control fields.
    #[must_use]
    pub fn to_record(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut record = serde_json::Map::with_capacity(self.values.len() + RESERVED_FIELDS.len());
        for (name, value) in &self.values {
            record.insert(name.clone(), value.to_json());
        }
        record.insert(ENTITY_ID_FIELD.to_string(), self.id.as_str().into());
        record.insert(
            VALID_FROM_FIELD.to_string(),
            self.valid_time.from().to_rfc3339().into(),
        );
        record.insert(
            VALID_UNTIL_FIELD.to_string(),
            self.valid_time.until().to_rfc3339().into(),
        );
        record.insert(KNOWN_AT_FIELD.to_string(), self.known_at.to_rfc3339().into());
        record
    }

    /// Rebuilds a version from a flattened record.
    ///
    /// # Errors
    ///
    /// `StorageError::Serialization` if a control field is missing or malformed.
    pub fn from_record(
        mut record: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, StorageError> {
        let id = take_string(&mut record, ENTITY_ID_FIELD)?;
        let id = EntityId::new(id).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let from = take_time(&mut record, VALID_FROM_FIELD)?;
        let until = take_time(&mut record, VALID_UNTIL_FIELD)?;
        let known_at = take_time(&mut record, KNOWN_AT_FIELD)?;
        let valid_time =
            TimeRange::new(from, until).map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Control fields are gone; everything left is an attribute.
        let values = Attributes::try_from(
            record
                .into_iter()
                .map(|(name, value)| (name, Value::from(value)))
                .collect::<BTreeMap<_, _>>(),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Self {
            id,
            values,
            valid_time,
            known_at,
        })
    }
}

impl fmt::Display for EntityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} valid {} known at {}",
            self.id, self.valid_time, self.known_at
        )
    }
}

fn take_string(
    record: &mut serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<String, StorageError> {
    match record.remove(field) {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(StorageError::Serialization(format!(
            "record field '{field}' must be a string, got {other}"
        ))),
        None => Err(StorageError::Serialization(format!(
            "record is missing field '{field}'"
        ))),
    }
}

fn take_time(
    record: &mut serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<DateTime<Utc>, StorageError> {
    let raw = take_string(record, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("record field '{field}': {e}")))
}
