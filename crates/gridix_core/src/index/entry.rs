//! Indexed projection of one cache entry.

use crate::types::{Version, NEVER_EXPIRES};
use gridix_codec::Value;

/// Position of an entry in a type table's arena.
pub(crate) type Slot = usize;

/// The indexed projection of one cache entry.
///
/// Entries are immutable and shared behind `Arc`: an update installs a new
/// entry, so a reader holding one always sees a single complete store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    key: Value,
    fields: Vec<Value>,
    value: Option<Value>,
    version: Version,
    expiration_time: u64,
}

impl IndexEntry {
    pub(crate) fn new(
        key: Value,
        fields: Vec<Value>,
        value: Value,
        version: Version,
        expiration_time: u64,
    ) -> Self {
        Self {
            key,
            fields,
            value: Some(value),
            version,
            expiration_time,
        }
    }

    /// Returns the cache key.
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Returns the projected field values, in descriptor order.
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the projected value of one field.
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Returns the cache value, or `None` while it is swapped out.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns true unless the value is swapped out.
    pub fn is_resident(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the version of the store that produced this entry.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the expiration time (`0` for never).
    pub fn expiration_time(&self) -> u64 {
        self.expiration_time
    }

    /// Returns true if the entry has expired at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration_time != NEVER_EXPIRES && self.expiration_time <= now
    }

    /// Returns a copy with the value dropped.
    pub(crate) fn swapped(&self) -> Self {
        Self {
            value: None,
            ..self.clone_projection()
        }
    }

    /// Returns a copy holding `value`.
    pub(crate) fn with_value(&self, value: Value) -> Self {
        Self {
            value: Some(value),
            ..self.clone_projection()
        }
    }

    fn clone_projection(&self) -> Self {
        Self {
            key: self.key.clone(),
            fields: self.fields.clone(),
            value: None,
            version: self.version.clone(),
            expiration_time: self.expiration_time,
        }
    }
}
