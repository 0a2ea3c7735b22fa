//! Per-node key storage, subject to migration on join and leave.

use std::collections::BTreeMap;

use crate::common::Id;

/// Stored payloads; a key may also be registered bare, with no payload.
pub type Value = u64;

/// Mapping from key to optional payload, owned by the node currently
/// responsible for that key's arc. Entries move wholesale between stores
/// during migration; an entry is never owned by two nodes simultaneously.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStore {
    entries: BTreeMap<Id, Option<Value>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Getters ===

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `key`: `None` when the key is not stored here, otherwise
    /// the (possibly absent) payload it was registered with.
    pub fn get(&self, key: Id) -> Option<Option<Value>> {
        self.entries.get(&key).copied()
    }

    // === Public Methods ===

    /// Stores an entry, returning the previous one when the key was already
    /// present.
    pub fn insert(&mut self, key: Id, value: Option<Value>) -> Option<Option<Value>> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: Id) -> Option<Option<Value>> {
        self.entries.remove(&key)
    }

    /// Takes every entry out of the store, in key order. Leave-time migration
    /// moves these wholesale into the successor's store.
    pub fn drain(&mut self) -> Vec<(Id, Option<Value>)> {
        let drained = std::mem::take(&mut self.entries);

        drained.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, Option<Value>)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, *value))
    }
}
