//! Authoritative cache collaborator.

use crate::context::{Component, ComponentKind};
use crate::error::CoreResult;
use crate::types::{SpaceName, Version, NEVER_EXPIRES};
use gridix_codec::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One entry reported by a [`CacheSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Cache key.
    pub key: Value,
    /// Current value.
    pub value: Value,
    /// Version of the current value.
    pub version: Version,
    /// Expiration time in epoch milliseconds, `0` for never.
    pub expiration_time: u64,
}

/// Read access to the primary cache.
///
/// Used to load values whose index entries are swapped out, and as the
/// source of truth for index rebuilds.
pub trait CacheSource: Send + Sync {
    /// Loads the current value of a key.
    fn load(&self, space: &SpaceName, key: &Value) -> CoreResult<Option<Value>>;

    /// Returns every entry of the given type held in a space.
    fn entries(&self, space: &SpaceName, type_name: &str) -> CoreResult<Vec<SourceEntry>>;
}

#[derive(Debug, Clone)]
struct CachedValue {
    type_name: String,
    value: Value,
    version: Version,
    expiration_time: u64,
}

/// In-memory primary cache.
///
/// Keeps the latest value per key together with its type name, and serves
/// as the `Cache` component of a [`GridContext`](crate::GridContext).
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<(SpaceName, Value), CachedValue>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing whatever the key held before.
    pub fn put(
        &self,
        space: &SpaceName,
        type_name: &str,
        key: Value,
        value: Value,
        version: Version,
    ) {
        self.put_expiring(space, type_name, key, value, version, NEVER_EXPIRES);
    }

    /// Stores a value with an expiration time.
    pub fn put_expiring(
        &self,
        space: &SpaceName,
        type_name: &str,
        key: Value,
        value: Value,
        version: Version,
        expiration_time: u64,
    ) {
        self.entries.write().insert(
            (space.clone(), key),
            CachedValue {
                type_name: type_name.to_string(),
                value,
                version,
                expiration_time,
            },
        );
    }

    /// Removes a key, returning its value.
    pub fn remove(&self, space: &SpaceName, key: &Value) -> Option<Value> {
        self.entries
            .write()
            .remove(&(space.clone(), key.clone()))
            .map(|cached| cached.value)
    }

    /// Returns the number of keys held across all spaces.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheSource for MemoryCache {
    fn load(&self, space: &SpaceName, key: &Value) -> CoreResult<Option<Value>> {
        Ok(self
            .entries
            .read()
            .get(&(space.clone(), key.clone()))
            .map(|cached| cached.value.clone()))
    }

    fn entries(&self, space: &SpaceName, type_name: &str) -> CoreResult<Vec<SourceEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|((s, _), cached)| s == space && cached.type_name.eq_ignore_ascii_case(type_name))
            .map(|((_, key), cached)| SourceEntry {
                key: key.clone(),
                value: cached.value.clone(),
                version: cached.version.clone(),
                expiration_time: cached.expiration_time,
            })
            .collect())
    }
}

impl Component for MemoryCache {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Cache
    }

    fn name(&self) -> &str {
        "memory-cache"
    }

    fn cache_source(self: Arc<Self>) -> Option<Arc<dyn CacheSource>> {
        Some(self)
    }
}
