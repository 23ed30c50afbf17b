//! Auxiliary per-object state.
//!
//! A [`SideMap`] attaches extra state to host objects it does not own. Keys
//! are stable object identities (an id, a handle, an address) rather than
//! the objects themselves, so an entry never keeps its owner alive. Entries
//! are removed only when the owner of the map is told an object was
//! discarded.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

#[derive(Debug, Clone)]
pub struct SideMap<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for SideMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> SideMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// State for `key`, created on first access
    pub fn get_or_insert_with(&mut self, key: K, create: impl FnOnce() -> V) -> &mut V {
        self.entries.entry(key).or_insert_with(create)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop the state of a discarded object
    pub fn evict(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// Drop the state of every object for which `discarded` returns true.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_where(&mut self, mut discarded: impl FnMut(&K, &V) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, value| !discarded(key, value));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {} side-map entries", evicted);
        }
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
