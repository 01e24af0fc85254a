//! Per-key version gate.
//!
//! The gate remembers, for every key of every space, the version of the
//! last applied store and the type that owns the key. Stores carrying a
//! version not strictly greater than the recorded one are stale and must be
//! discarded. A remove leaves a tombstone holding the last applied version,
//! so only a newer store resurrects the key.
//!
//! Keys are striped over a fixed number of mutex-protected shards. A
//! [`GateGuard`] holds the shard lock for the whole index mutation, which
//! makes store, remove, swap and unswap mutually exclusive per key while
//! unrelated keys proceed in parallel.

use crate::types::{SpaceName, Version};
use gridix_codec::Value;
use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

type GateKey = (SpaceName, Value);

/// What the gate knows about one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyState {
    /// Indexed under `owner` by the store carrying `version`.
    Live { version: Version, owner: Arc<str> },
    /// Removed after the store carrying `version`.
    Removed { version: Version },
}

/// Striped per-key version tracker.
#[derive(Debug)]
pub struct VersionGate {
    shards: Vec<Mutex<HashMap<GateKey, KeyState>>>,
    hasher: RandomState,
}

impl VersionGate {
    /// Creates a gate with `shards` lock stripes (minimum 1).
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
        }
    }

    /// Locks the stripe holding a key.
    pub(crate) fn lock(&self, space: &SpaceName, key: &Value) -> GateGuard<'_> {
        let gate_key = (space.clone(), key.clone());
        let shard = (self.hasher.hash_one(&gate_key) as usize) % self.shards.len();
        GateGuard {
            map: self.shards[shard].lock(),
            key: gate_key,
        }
    }

    /// Accepts `version` for a key if it is newer than the last applied one,
    /// advancing the recorded version.
    pub fn accept(&self, space: &SpaceName, key: &Value, version: &Version, owner: &str) -> bool {
        let mut guard = self.lock(space, key);
        if guard.accepts(version) {
            guard.apply_store(version.clone(), Arc::from(owner));
            true
        } else {
            false
        }
    }

    /// Records a remove for a key.
    pub fn remove(&self, space: &SpaceName, key: &Value) {
        self.lock(space, key).apply_remove();
    }

    /// Returns the version recorded for a key, live or removed.
    pub fn last_version(&self, space: &SpaceName, key: &Value) -> Option<Version> {
        match self.lock(space, key).state() {
            Some(KeyState::Live { version, .. }) => Some(version.clone()),
            Some(KeyState::Removed { version }) => Some(version.clone()),
            None => None,
        }
    }

    /// Returns the number of keys tracked.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Returns true if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every key.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}

/// Exclusive access to one key's gate state.
pub(crate) struct GateGuard<'a> {
    map: MutexGuard<'a, HashMap<GateKey, KeyState>>,
    key: GateKey,
}

impl GateGuard<'_> {
    pub(crate) fn state(&self) -> Option<&KeyState> {
        self.map.get(&self.key)
    }

    /// Returns the type the key is indexed under.
    pub(crate) fn owner(&self) -> Option<Arc<str>> {
        match self.state() {
            Some(KeyState::Live { owner, .. }) => Some(Arc::clone(owner)),
            _ => None,
        }
    }

    /// Returns true if a store carrying `version` is newer than anything
    /// applied so far.
    pub(crate) fn accepts(&self, version: &Version) -> bool {
        match self.state() {
            Some(KeyState::Live { version: last, .. })
            | Some(KeyState::Removed { version: last }) => version > last,
            None => true,
        }
    }

    pub(crate) fn apply_store(&mut self, version: Version, owner: Arc<str>) {
        self.map
            .insert(self.key.clone(), KeyState::Live { version, owner });
    }

    /// Turns the key into a tombstone, returning its previous owner.
    ///
    /// A key no store was ever applied to stays untracked.
    pub(crate) fn apply_remove(&mut self) -> Option<Arc<str>> {
        let (version, owner) = match self.map.remove(&self.key) {
            Some(KeyState::Live { version, owner }) => (version, Some(owner)),
            Some(KeyState::Removed { version }) => (version, None),
            None => return None,
        };
        self.map
            .insert(self.key.clone(), KeyState::Removed { version });
        owner
    }

    /// Puts back a state read earlier through [`state`](Self::state).
    pub(crate) fn restore(&mut self, state: Option<KeyState>) {
        match state {
            Some(state) => {
                self.map.insert(self.key.clone(), state);
            }
            None => self.forget(),
        }
    }

    pub(crate) fn forget(&mut self) {
        self.map.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(n: u64) -> Version {
        Version::from_u64(n)
    }

    #[test]
    fn stale_store_is_rejected() {
        let gate = VersionGate::new(4);
        let space = SpaceName::DEFAULT;
        let key = Value::from("k");

        assert!(gate.accept(&space, &key, &v(2), "T"));
        assert!(!gate.accept(&space, &key, &v(1), "T"));
        assert!(!gate.accept(&space, &key, &v(2), "T"));
        assert!(gate.accept(&space, &key, &v(3), "T"));
        assert_eq!(gate.last_version(&space, &key), Some(v(3)));
    }

    #[test]
    fn remove_leaves_tombstone() {
        let gate = VersionGate::new(4);
        let space = SpaceName::named("s");
        let key = Value::Integer(1);

        gate.accept(&space, &key, &v(5), "T");
        gate.remove(&space, &key);

        assert!(!gate.accept(&space, &key, &v(4), "T"));
        assert!(!gate.accept(&space, &key, &v(5), "T"));
        assert!(gate.accept(&space, &key, &v(6), "T"));
    }

    #[test]
    fn remove_of_unknown_key_accepts_any_store() {
        let gate = VersionGate::new(1);
        let key = Value::Integer(1);
        gate.remove(&SpaceName::DEFAULT, &key);
        assert!(gate.accept(&SpaceName::DEFAULT, &key, &v(0), "T"));
    }

    #[test]
    fn removes_of_unknown_keys_are_not_tracked() {
        let gate = VersionGate::new(4);
        for n in 0..1_000 {
            gate.remove(&SpaceName::DEFAULT, &Value::Integer(n));
        }
        assert!(gate.is_empty());

        gate.accept(&SpaceName::DEFAULT, &Value::Integer(1), &v(1), "T");
        gate.remove(&SpaceName::DEFAULT, &Value::Integer(1));
        gate.remove(&SpaceName::DEFAULT, &Value::Integer(1));
        assert_eq!(gate.len(), 1);
        assert_eq!(gate.last_version(&SpaceName::DEFAULT, &Value::Integer(1)), Some(v(1)));
    }

    #[test]
    fn spaces_are_independent() {
        let gate = VersionGate::new(2);
        let key = Value::Integer(1);
        assert!(gate.accept(&SpaceName::named("a"), &key, &v(9), "T"));
        assert!(gate.accept(&SpaceName::named("b"), &key, &v(1), "T"));
    }

    #[test]
    fn guard_tracks_owner() {
        let gate = VersionGate::new(2);
        let space = SpaceName::DEFAULT;
        let key = Value::Integer(1);
        let owner: Arc<str> = Arc::from("Person");

        let mut guard = gate.lock(&space, &key);
        assert!(guard.owner().is_none());
        guard.apply_store(v(3), owner);
        assert!(!guard.accepts(&v(3)));
        assert_eq!(guard.owner().as_deref(), Some("Person"));
        let before = guard.state().cloned();

        assert_eq!(guard.apply_remove().as_deref(), Some("Person"));
        assert!(guard.owner().is_none());
        guard.restore(before);
        assert_eq!(guard.owner().as_deref(), Some("Person"));
        guard.restore(None);
        assert!(guard.state().is_none());
    }

    proptest! {
        #[test]
        fn applied_versions_are_strictly_increasing(
            versions in proptest::collection::vec(0u64..50, 1..40)
        ) {
            let gate = VersionGate::new(8);
            let key = Value::from("k");
            let mut applied: Vec<u64> = Vec::new();
            for n in versions {
                if gate.accept(&SpaceName::DEFAULT, &key, &v(n), "T") {
                    applied.push(n);
                }
            }
            prop_assert!(applied.windows(2).all(|w| w[0] < w[1]));
            let max = applied.iter().max().copied();
            prop_assert_eq!(gate.last_version(&SpaceName::DEFAULT, &key), max.map(v));
        }
    }
}
