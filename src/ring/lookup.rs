//! Lookup engine: successor resolution, closest-preceding-finger selection,
//! and path-recording key queries.
//!
//! Resolution is expressed as a hop loop rather than literal recursion: every
//! iteration is the step a networked deployment would turn into a
//! request/response exchange, and the loop keeps the call stack flat.

use tracing::{debug, trace};

use crate::common::Id;
use crate::key_store::Value;
use crate::{Error, Result};

use super::Ring;

/// Outcome of a key query at its resolved owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupValue {
    /// The key is not stored at the owner.
    Missing,
    /// The key is registered with no payload.
    Registered,
    /// The key is registered with this payload.
    Value(Value),
}

/// Result of [Ring::iterative_lookup].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// The node responsible for the key.
    pub owner: Id,
    /// Nodes recorded along the query: the initiator and the resolved owner.
    /// Intermediate hops are not recorded here; [Ring::lookup_path] records
    /// every hop instead.
    pub path: Vec<Id>,
    /// What the owner stores for the key.
    pub value: LookupValue,
}

impl Ring {
    // === Public Methods ===

    /// Resolves the node responsible for `key`, starting at `from`.
    ///
    /// Each hop either answers with the current node's successor (when `key`
    /// falls in `(current, successor]`) or forwards to the closest preceding
    /// finger for the key.
    pub fn find_successor(&self, from: Id, key: Id) -> Result<Id> {
        self.check_key(key)?;
        self.member(from)?;

        let mut current = from;

        loop {
            let successor = self.successor(current)?;
            if self.space().in_interval(key, current, successor, true) {
                trace!(node = %current, key = %key, owner = %successor, "resolved successor");
                return Ok(successor);
            }

            let next = self.closest_preceding_finger(current, key)?;
            if next == current {
                // No finger precedes the key; the successor answers.
                return Ok(successor);
            }

            trace!(node = %current, next = %next, key = %key, "forwarding lookup");
            current = next;
        }
    }

    /// The id of the node responsible for `key`.
    pub fn find(&self, from: Id, key: Id) -> Result<Id> {
        let owner = self.find_successor(from, key)?;
        debug!(key = %key, owner = %owner, "key located");

        Ok(owner)
    }

    /// Resolves `key` and reads its entry at the owner, recording the
    /// initiator and the owner as the query path.
    pub fn iterative_lookup(&self, from: Id, key: Id) -> Result<Lookup> {
        let owner = self.find_successor(from, key)?;

        let value = match self.member(owner)?.keys.get(key) {
            None => LookupValue::Missing,
            Some(None) => LookupValue::Registered,
            Some(Some(value)) => LookupValue::Value(value),
        };

        Ok(Lookup {
            owner,
            path: vec![from, owner],
            value,
        })
    }

    /// Resolves the owner of `key` while recording every node visited,
    /// including the initiator. Returns the owner and the hop path.
    pub fn lookup_path(&self, from: Id, key: Id) -> Result<(Id, Vec<Id>)> {
        self.check_key(key)?;
        self.member(from)?;

        let mut path = Vec::new();
        let mut current = from;

        loop {
            path.push(current);

            let successor = self.successor(current)?;
            if self.space().in_interval(key, current, successor, true) {
                return Ok((successor, path));
            }

            let next = self.closest_preceding_finger(current, key)?;
            if next == current {
                return Ok((successor, path));
            }
            current = next;
        }
    }

    // === Private Methods ===

    /// The farthest finger of `node` that does not overshoot `key`: scan the
    /// slots from the top down and return the first finger in the open
    /// interval `(node, key)`, or `node` itself when none qualifies.
    pub(super) fn closest_preceding_finger(&self, node: Id, key: Id) -> Result<Id> {
        let state = self.member(node)?;

        for slot in (1..=state.finger.slots()).rev() {
            if let Some(finger) = state.finger.get(slot) {
                if self.space().in_interval(finger, node, key, false) {
                    return Ok(finger);
                }
            }
        }

        Ok(node)
    }

    /// The node whose arc `key`'s predecessor position falls into: hop via
    /// closest preceding fingers until `key` is in `(current, successor]`.
    /// Internal to the join/leave repair protocol.
    pub(super) fn find_predecessor(&self, from: Id, key: Id) -> Result<Id> {
        let mut current = from;

        loop {
            let successor = self.successor(current)?;
            if self.space().in_interval(key, current, successor, true) {
                return Ok(current);
            }

            let next = self.closest_preceding_finger(current, key)?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
    }

    fn check_key(&self, key: Id) -> Result<()> {
        if !self.space().contains(key) {
            return Err(Error::IdOutOfRange(key, self.space().bits()));
        }

        Ok(())
    }
}
