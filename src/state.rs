//! Mutex-guarded node state (§3, §5).
//!
//! Every field a node mutates at runtime lives behind one lock. The
//! critical-section rule (§5) is enforced structurally here: the only way
//! to read or write this state is through `snapshot`/short-lived mutation
//! closures that never themselves perform network I/O. Callers that need
//! to combine a read, an RPC, and a write take a snapshot, drop the lock,
//! make the RPC, then reacquire the lock to commit.

use std::sync::Mutex;

use crate::address::Address;
use crate::finger::FingerTable;
use crate::ring::HashPos;
use crate::successor_list::SuccessorList;

/// A node's lifecycle (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Listening, but not yet known to be correctly positioned in the ring.
    Fresh,
    /// Has completed at least one stabilize round (or started its own ring).
    Joined,
    /// Shutting down or shut down; no further maintenance should run.
    Terminated,
}

/// A consistent snapshot of the fields a caller needs, taken under the lock
/// and safe to hold across an `.await` once the lock is released.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub self_address: Address,
    pub self_id: HashPos,
    pub predecessor: Option<Address>,
    pub successors: Vec<Address>,
    pub phase: Phase,
}

struct Inner {
    predecessor: Option<Address>,
    successor_list: SuccessorList,
    finger_table: FingerTable,
    phase: Phase,
}

pub struct NodeState {
    self_address: Address,
    self_id: HashPos,
    modulus: HashPos,
    inner: Mutex<Inner>,
}

impl NodeState {
    /// State for a node starting its own single-node ring.
    pub fn new_lone(self_address: Address, modulus: HashPos, m: u32, successor_list_len: usize) -> Self {
        let self_id = self_address.identifier(modulus);
        let inner = Inner {
            predecessor: None,
            successor_list: SuccessorList::lone(self_address.clone(), successor_list_len),
            finger_table: FingerTable::new(self_id, &self_address, m, modulus),
            phase: Phase::Joined,
        };
        NodeState {
            self_address,
            self_id,
            modulus,
            inner: Mutex::new(inner),
        }
    }

    /// State for a node that has located its successor via a bootstrap peer
    /// but has not yet completed its first stabilize round (§9).
    pub fn new_joining(
        self_address: Address,
        modulus: HashPos,
        m: u32,
        successor_list_len: usize,
        first_successor: Address,
    ) -> Self {
        let self_id = self_address.identifier(modulus);
        let inner = Inner {
            predecessor: None,
            successor_list: SuccessorList::with_first_successor(first_successor, successor_list_len),
            finger_table: FingerTable::new(self_id, &self_address, m, modulus),
            phase: Phase::Fresh,
        };
        NodeState {
            self_address,
            self_id,
            modulus,
            inner: Mutex::new(inner),
        }
    }

    pub fn self_address(&self) -> &Address {
        &self.self_address
    }

    pub fn self_id(&self) -> HashPos {
        self.self_id
    }

    pub fn modulus(&self) -> HashPos {
        self.modulus
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().unwrap();
        Snapshot {
            self_address: self.self_address.clone(),
            self_id: self.self_id,
            predecessor: inner.predecessor.clone(),
            successors: inner.successor_list.as_slice(),
            phase: inner.phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().unwrap().phase
    }

    pub fn mark_joined(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.phase == Phase::Fresh {
            inner.phase = Phase::Joined;
        }
    }

    pub fn mark_terminated(&self) {
        self.inner.lock().unwrap().phase = Phase::Terminated;
    }

    pub fn immediate_successor(&self) -> Address {
        self.inner.lock().unwrap().successor_list.immediate().clone()
    }

    pub fn successors(&self) -> Vec<Address> {
        self.inner.lock().unwrap().successor_list.as_slice()
    }

    pub fn predecessor(&self) -> Option<Address> {
        self.inner.lock().unwrap().predecessor.clone()
    }

    pub fn set_predecessor(&self, address: Option<Address>) {
        self.inner.lock().unwrap().predecessor = address;
    }

    /// Evict the dead immediate successor (§4.4 Stabilize, §7 recovery).
    pub fn evict_immediate_successor(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.successor_list.evict_immediate(&self.self_address);
    }

    /// Replace the successor list after a successful stabilize round.
    pub fn rebuild_successors(&self, new_first: Address, tail: &[Address]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .successor_list
            .rebuild(new_first, tail, &self.self_address);
    }

    pub fn set_immediate_successor(&self, address: Address) {
        self.inner.lock().unwrap().successor_list.set_immediate(address);
    }

    pub fn finger_count(&self) -> usize {
        self.inner.lock().unwrap().finger_table.len()
    }

    pub fn finger_start(&self, index: usize) -> HashPos {
        self.inner.lock().unwrap().finger_table.get(index).start
    }

    pub fn finger_node(&self, index: usize) -> Address {
        self.inner.lock().unwrap().finger_table.get(index).node.clone()
    }

    pub fn set_finger_node(&self, index: usize, node: Address) {
        self.inner.lock().unwrap().finger_table.set_node(index, node);
    }

    /// Clear every finger pointing at `dead`, substituting self (§4.4,
    /// §9 "Resolved — finger eviction policy").
    pub fn clear_fingers_pointing_at(&self, dead: &Address) {
        let mut inner = self.inner.lock().unwrap();
        let self_address = self.self_address.clone();
        inner.finger_table.clear_matching(dead, &self_address);
    }

    /// Fingers from highest index to lowest, as `closest_preceding_finger`
    /// (§4.4) needs them, snapshotted so the caller can iterate without
    /// holding the lock across RPCs.
    pub fn fingers_highest_first(&self) -> Vec<(HashPos, Address)> {
        let inner = self.inner.lock().unwrap();
        inner
            .finger_table
            .iter_rev()
            .map(|entry| (entry.start, entry.node.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::new("127.0.0.1", port)
    }

    #[test]
    fn lone_node_starts_joined_with_self_as_successor() {
        let state = NodeState::new_lone(addr(1), 256, 8, 4);
        assert_eq!(state.phase(), Phase::Joined);
        assert_eq!(state.immediate_successor(), addr(1));
        assert_eq!(state.predecessor(), None);
    }

    #[test]
    fn joining_node_starts_fresh_until_marked() {
        let state = NodeState::new_joining(addr(1), 256, 8, 4, addr(2));
        assert_eq!(state.phase(), Phase::Fresh);
        state.mark_joined();
        assert_eq!(state.phase(), Phase::Joined);
    }

    #[test]
    fn eviction_falls_back_to_self() {
        let state = NodeState::new_joining(addr(1), 256, 8, 4, addr(2));
        state.evict_immediate_successor();
        assert_eq!(state.immediate_successor(), addr(1));
    }
}
