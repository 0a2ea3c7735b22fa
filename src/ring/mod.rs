//! Ring membership: join, leave, insert, and finger-table repair.
//!
//! The ring is the single consistency domain. It owns every node's state and
//! every "remote" operation of the protocol (a lookup on a peer, an update of
//! a peer's finger table or predecessor pointer) is a method here, addressed
//! by node [Id]. Nodes hold ids, never references.

mod lookup;

pub use lookup::{Lookup, LookupValue};

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::common::{Id, IdSpace};
use crate::finger_table::FingerTable;
use crate::key_store::{KeyStore, Value};
use crate::{Error, Result};

/// A ring of nodes ordered cyclically by identifier modulo `2^m`, each
/// responsible for the arc of keys `(predecessor, self]`.
#[derive(Debug)]
pub struct Ring {
    space: IdSpace,
    nodes: BTreeMap<Id, NodeState>,
}

/// Per-node protocol state. `predecessor` is `None` until the node joins;
/// a leaving node is removed from the registry outright.
#[derive(Debug)]
struct NodeState {
    finger: FingerTable,
    predecessor: Option<Id>,
    keys: KeyStore,
}

impl NodeState {
    fn new(slots: usize) -> Self {
        NodeState {
            finger: FingerTable::new(slots),
            predecessor: None,
            keys: KeyStore::new(),
        }
    }

    fn is_joined(&self) -> bool {
        self.predecessor.is_some()
    }
}

impl Ring {
    /// Creates an empty ring over an m-bit identifier space.
    pub fn new(bits: u32) -> Result<Self> {
        Ok(Ring {
            space: IdSpace::new(bits)?,
            nodes: BTreeMap::new(),
        })
    }

    // === Getters ===

    pub fn space(&self) -> IdSpace {
        self.space
    }

    /// Number of registered nodes, joined or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Registered node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.nodes.keys().copied()
    }

    /// The node's immediate successor (finger slot 1).
    pub fn successor(&self, node: Id) -> Result<Id> {
        self.node(node)?
            .finger
            .successor()
            .ok_or(Error::NotJoined(node))
    }

    /// The node's predecessor on the ring.
    pub fn predecessor(&self, node: Id) -> Result<Id> {
        self.node(node)?.predecessor.ok_or(Error::NotJoined(node))
    }

    /// Read-only view of the node's finger table, for diagnostics.
    pub fn finger_table(&self, node: Id) -> Result<&FingerTable> {
        Ok(&self.node(node)?.finger)
    }

    /// The keys currently stored at the node, in key order.
    pub fn local_keys(&self, node: Id) -> Result<Vec<(Id, Option<Value>)>> {
        Ok(self.node(node)?.keys.iter().collect())
    }

    // === Public Methods ===

    /// Registers a node with a fixed identifier, born unconnected. Fails when
    /// the id does not fit the space or is already taken.
    pub fn add_node(&mut self, id: Id) -> Result<()> {
        if !self.space.contains(id) {
            return Err(Error::IdOutOfRange(id, self.space.bits()));
        }
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }

        self.nodes.insert(id, NodeState::new(self.space.slots()));

        Ok(())
    }

    /// Connects a registered node to the ring.
    ///
    /// With no bootstrap the node starts a new ring: every finger slot and the
    /// predecessor point at itself. With a bootstrap (any joined member) the
    /// node resolves its successor, splices itself between that successor and
    /// its old predecessor, initializes the remaining finger slots, takes over
    /// the keys of its new arc, and repoints the finger tables of existing
    /// members that should now route through it.
    pub fn join(&mut self, node: Id, bootstrap: Option<Id>) -> Result<()> {
        if self.node(node)?.is_joined() {
            return Err(Error::AlreadyJoined(node));
        }

        match bootstrap {
            None => self.join_first(node),
            Some(bootstrap) => self.join_via(node, bootstrap),
        }
    }

    /// Disconnects a joined node: its keys move to its successor, ring
    /// continuity is patched around it, stale finger entries pointing at it
    /// are repaired ring-wide, and the node is dropped from the registry.
    pub fn leave(&mut self, node: Id) -> Result<()> {
        if !self.node(node)?.is_joined() {
            return Err(Error::NotJoined(node));
        }

        let successor = self.successor(node)?;

        if successor == node {
            // Last member; its keys have no other home.
            let state = self.remove_state(node)?;
            debug!(
                node = %node,
                orphaned_keys = state.keys.len(),
                "last member left, ring is empty"
            );

            return Ok(());
        }

        let predecessor = self.predecessor(node)?;

        // 1. Migrate every key to the successor.
        let moving = self.node_mut(node)?.keys.drain();
        for (key, value) in moving {
            self.node_mut(successor)?.keys.insert(key, value);
            debug!(key = %key, from = %node, to = %successor, "migrated key");
        }

        // 2. Patch ring continuity around the departing node.
        self.node_mut(predecessor)?.finger.set(1, successor);
        self.node_mut(successor)?.predecessor = Some(predecessor);

        // 3. Repair stale finger entries ring-wide.
        for slot in 1..=self.space.slots() {
            let target = self.space.next(self.space.finger_mirror(node, slot));
            let mut from = self.find_predecessor(node, target)?;
            if from == node {
                // The mirror point falls in the departing node's own successor
                // arc; the last live holder of a stale entry is then its
                // predecessor.
                from = predecessor;
            }
            self.fix_finger_walk(from, node, successor, slot)?;
        }

        self.remove_state(node)?;
        debug!(node = %node, successor = %successor, "node left the ring");

        Ok(())
    }

    /// Registers `key` with no payload at the node responsible for it.
    /// Returns the owner's id.
    pub fn insert(&mut self, via: Id, key: Id) -> Result<Id> {
        self.store(via, key, None)
    }

    /// Registers `key` with a payload at the node responsible for it,
    /// overwriting any prior entry. Returns the owner's id.
    pub fn insert_value(&mut self, via: Id, key: Id, value: Value) -> Result<Id> {
        self.store(via, key, Some(value))
    }

    // === Private Methods ===

    fn join_first(&mut self, node: Id) -> Result<()> {
        let joined = self.nodes.values().filter(|state| state.is_joined()).count();
        if joined > 0 {
            return Err(Error::RingNotEmpty(joined));
        }

        let state = self.node_mut(node)?;
        state.finger.fill(node);
        state.predecessor = Some(node);

        debug!(node = %node, "first node joined, ring started");

        Ok(())
    }

    fn join_via(&mut self, node: Id, bootstrap: Id) -> Result<()> {
        // The lookup target is id + 1, which cannot resolve to the joiner
        // itself.
        let successor = self.find_successor(bootstrap, self.space.next(node))?;
        let predecessor = self.predecessor(successor)?;

        {
            let state = self.node_mut(node)?;
            state.finger.set(1, successor);
            state.predecessor = Some(predecessor);
        }
        self.node_mut(successor)?.predecessor = Some(node);

        // Initialize the remaining slots, reusing the previous entry whenever
        // it already covers the next start. This keeps join near O(log^2 N)
        // instead of one full lookup per slot.
        for slot in 1..self.space.slots() {
            let start = self.space.finger_start(node, slot + 1);
            let entry = match self.node(node)?.finger.get(slot) {
                Some(current) if self.space.in_interval(start, node, current, false) => current,
                // A start inside the joiner's own arc (predecessor, node] is
                // owned by the joiner; the bootstrap would resolve it against
                // the ring as it was before this join.
                _ if self.space.in_interval(start, predecessor, node, true) => node,
                _ => self.find_successor(bootstrap, start)?,
            };
            self.node_mut(node)?.finger.set(slot + 1, entry);
        }

        // Take over the keys of the new arc (predecessor, node].
        let moving: Vec<(Id, Option<Value>)> = self
            .node(successor)?
            .keys
            .iter()
            .filter(|(key, _)| self.space.in_interval(*key, predecessor, node, true))
            .collect();
        for (key, value) in moving {
            self.node_mut(successor)?.keys.remove(key);
            self.node_mut(node)?.keys.insert(key, value);
            debug!(key = %key, from = %successor, to = %node, "migrated key");
        }

        self.update_others(node)?;

        debug!(node = %node, bootstrap = %bootstrap, successor = %successor, "node joined");

        Ok(())
    }

    /// Repoints existing members' finger tables at a freshly joined node: for
    /// every slot, walk backward from the last node whose slot could cover the
    /// joiner, updating entries until one no longer qualifies.
    fn update_others(&mut self, node: Id) -> Result<()> {
        for slot in 1..=self.space.slots() {
            // First identifier past the mirror point, so a member sitting
            // exactly on the mirror is still visited by the walk.
            let target = self.space.next(self.space.finger_mirror(node, slot));
            let from = self.find_predecessor(node, target)?;
            self.update_finger_walk(from, node, slot)?;
        }

        Ok(())
    }

    /// Backward walk of the join repair: while the joiner falls inside
    /// `(current, finger[slot])`, adopt it and step to the predecessor.
    fn update_finger_walk(&mut self, from: Id, node: Id, slot: usize) -> Result<()> {
        let mut current = from;

        loop {
            let entry = match self.node(current)?.finger.get(slot) {
                Some(entry) => entry,
                None => break,
            };
            if !self.space.in_interval(node, current, entry, false) {
                break;
            }

            self.node_mut(current)?.finger.set(slot, node);
            trace!(node = %current, slot, adopted = %node, "finger entry updated");

            let predecessor = self.predecessor(current)?;
            if predecessor == node || predecessor == current || predecessor == from {
                break;
            }
            current = predecessor;
        }

        Ok(())
    }

    /// Backward walk of the leave repair: replace finger entries still naming
    /// the departed node, terminating once the stale reference no longer
    /// appears.
    fn fix_finger_walk(&mut self, from: Id, leaving: Id, successor: Id, slot: usize) -> Result<()> {
        let mut current = from;

        loop {
            if self.node(current)?.finger.get(slot) != Some(leaving) {
                break;
            }

            self.node_mut(current)?.finger.set(slot, successor);
            trace!(node = %current, slot, stale = %leaving, adopted = %successor, "stale finger repaired");

            let predecessor = self.predecessor(current)?;
            if predecessor == leaving || predecessor == current || predecessor == from {
                break;
            }
            current = predecessor;
        }

        Ok(())
    }

    fn store(&mut self, via: Id, key: Id, value: Option<Value>) -> Result<Id> {
        if !self.space.contains(key) {
            return Err(Error::IdOutOfRange(key, self.space.bits()));
        }

        let owner = self.find_successor(via, key)?;
        self.node_mut(owner)?.keys.insert(key, value);

        debug!(key = %key, owner = %owner, "key inserted");

        Ok(owner)
    }

    fn remove_state(&mut self, id: Id) -> Result<NodeState> {
        self.nodes.remove(&id).ok_or(Error::UnknownNode(id))
    }

    fn node(&self, id: Id) -> Result<&NodeState> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: Id) -> Result<&mut NodeState> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))
    }

    /// Like [Ring::node] but requires ring membership.
    fn member(&self, id: Id) -> Result<&NodeState> {
        let state = self.node(id)?;
        if !state.is_joined() {
            return Err(Error::NotJoined(id));
        }

        Ok(state)
    }
}
