//! Per-node routing table of m entries enabling O(log N)-hop lookup.

use std::fmt::{self, Display, Formatter};

use crate::common::Id;

/// A node's routing table: one slot per bit of the identifier space, indexed
/// `1..=m`. Slot `i` conceptually denotes "the successor of
/// `(owner + 2^(i-1)) mod 2^m`", so slot 1 is always the owner's immediate
/// successor.
///
/// This is a plain indexed container; all invariant maintenance lives in
/// [Ring](crate::Ring). Slots are uninitialized until the owner joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerTable {
    entries: Vec<Option<Id>>,
}

impl FingerTable {
    pub fn new(slots: usize) -> Self {
        FingerTable {
            entries: vec![None; slots],
        }
    }

    // === Getters ===

    pub fn slots(&self) -> usize {
        self.entries.len()
    }

    /// The entry at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside `1..=m`; slot indices are fixed by the
    /// identifier space and passing anything else is a programmer error.
    pub fn get(&self, slot: usize) -> Option<Id> {
        self.entries[slot - 1]
    }

    /// Slot 1, the owner's immediate successor.
    pub fn successor(&self) -> Option<Id> {
        self.entries[0]
    }

    // === Public Methods ===

    /// Sets the entry at `slot`. Panics on slot misuse like [FingerTable::get].
    pub fn set(&mut self, slot: usize, node: Id) {
        self.entries[slot - 1] = Some(node);
    }

    /// Points every slot at `node`. Used when the first node starts a ring.
    pub fn fill(&mut self, node: Id) {
        for entry in self.entries.iter_mut() {
            *entry = Some(node);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Id>> + '_ {
        self.entries.iter().copied()
    }
}

impl Display for FingerTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                Some(node) => writeln!(f, "Entry {}: Node {}", index + 1, node)?,
                None => writeln!(f, "Entry {}: uninitialized", index + 1)?,
            }
        }

        Ok(())
    }
}
