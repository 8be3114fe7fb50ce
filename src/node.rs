//! Protocol logic: join, lookup, stabilize, fix fingers, check predecessor,
//! and inbound RPC dispatch (§4.4). This is the component the teacher's
//! `ChordService` played the equivalent role for, generalized off gRPC onto
//! the plain line protocol in `protocol.rs`.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, warn};

use crate::address::Address;
use crate::config::{RingConfig, Tuning};
use crate::error::{ChordError, Result};
use crate::peer::PeerHandle;
use crate::protocol::{Command, Reply};
use crate::ring::{in_range_closed_right, in_range_open, HashPos};
use crate::state::{NodeState, Phase};

pub struct Node {
    state: NodeState,
    ring: RingConfig,
    tuning: Tuning,
    peers: Mutex<HashMap<Address, std::sync::Arc<PeerHandle>>>,
}

impl Node {
    /// Start a brand-new, single-node ring.
    pub fn start_lone(self_address: Address, ring: RingConfig, tuning: Tuning) -> Node {
        let modulus = ring.modulus();
        let state = NodeState::new_lone(self_address, modulus, ring.m, tuning.successor_list_len);
        Node {
            state,
            ring,
            tuning,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Join an existing ring via `bootstrap` (§4.4 Join).
    pub async fn join(
        self_address: Address,
        bootstrap: Address,
        ring: RingConfig,
        tuning: Tuning,
    ) -> Result<Node> {
        let modulus = ring.modulus();
        let self_id = self_address.identifier(modulus);
        let bootstrap_handle = PeerHandle::new(bootstrap.clone(), tuning.rpc_timeout);
        let first_successor = bootstrap_handle.find_successor(self_id).await?;
        let state = NodeState::new_joining(
            self_address,
            modulus,
            ring.m,
            tuning.successor_list_len,
            first_successor,
        );
        Ok(Node {
            state,
            ring,
            tuning,
            peers: Mutex::new(HashMap::new()),
        })
    }

    pub fn self_address(&self) -> &Address {
        self.state.self_address()
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// A cached, mutex-serialized handle for `address` (§4.2).
    fn peer(&self, address: &Address) -> std::sync::Arc<PeerHandle> {
        let mut peers = self.peers.lock().unwrap();
        peers
            .entry(address.clone())
            .or_insert_with(|| {
                std::sync::Arc::new(PeerHandle::new(address.clone(), self.tuning.rpc_timeout))
            })
            .clone()
    }

    /// Dispatch an inbound parsed command against local state (§4.4 RPC dispatch).
    pub async fn handle(&self, command: Command) -> Result<Reply> {
        match command {
            Command::Ping => Ok(Reply::Empty),
            Command::GetSuccessor => Ok(Reply::Address(self.state.immediate_successor())),
            Command::GetPredecessor => Ok(Reply::OptionalAddress(self.state.predecessor())),
            Command::GetSuccessors => Ok(Reply::AddressList(self.state.successors())),
            Command::FindSuccessor(id) => {
                self.reject_if_not_joined("find_successor")?;
                self.find_successor(id).await.map(Reply::Address)
            }
            Command::ClosestPrecedingFinger(id) => {
                self.reject_if_not_joined("closest_preceding_finger")?;
                Ok(Reply::Address(self.closest_preceding_finger(id).await))
            }
            Command::Notify(candidate) => {
                self.notify(candidate);
                Ok(Reply::Empty)
            }
        }
    }

    /// Lookup traffic is deferred until this node has completed its first
    /// stabilize round (§4.4 Join, §9 "successor-list source"): a `Fresh`
    /// node's successor list holds only the address it learned from its
    /// bootstrap peer, with no finger table built yet.
    fn reject_if_not_joined(&self, operation: &'static str) -> Result<()> {
        if self.state.phase() == Phase::Fresh {
            return Err(ChordError::ProtocolError(format!(
                "{operation}: node has not completed its first stabilize round yet"
            )));
        }
        Ok(())
    }

    /// `find_successor(id)` (§4.4 Lookup).
    pub async fn find_successor(&self, id: HashPos) -> Result<Address> {
        let modulus = self.ring.modulus();
        let self_id = self.state.self_id();
        let successor = self.state.immediate_successor();
        let successor_id = successor.identifier(modulus);

        if in_range_closed_right(id, self_id, successor_id, modulus) {
            return Ok(successor);
        }

        let mut candidate = self.closest_preceding_finger(id).await;
        loop {
            if candidate == *self.state.self_address() {
                return Ok(self.state.immediate_successor());
            }
            let peer = self.peer(&candidate);
            match peer.find_successor(id).await {
                Ok(address) => return Ok(address),
                Err(err) if err.is_peer_unreachable() => {
                    warn!(
                        "find_successor: forwarding to {candidate} failed ({err}), evicting finger and retrying"
                    );
                    self.state.clear_fingers_pointing_at(&candidate);
                    candidate = self.closest_preceding_finger(id).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// `closest_preceding_finger(id)` (§4.4).
    pub async fn closest_preceding_finger(&self, id: HashPos) -> Address {
        let modulus = self.ring.modulus();
        let self_id = self.state.self_id();
        let self_address = self.state.self_address().clone();

        for (_, node) in self.state.fingers_highest_first() {
            if node == self_address {
                continue;
            }
            let node_id = node.identifier(modulus);
            if !in_range_open(node_id, self_id, id, modulus) {
                continue;
            }
            let peer = self.peer(&node);
            if peer.ping().await {
                return node;
            }
            debug!("closest_preceding_finger: finger {node} unreachable, clearing");
            self.state.clear_fingers_pointing_at(&node);
        }
        self_address
    }

    /// `notify(candidate)` handler (§4.4).
    pub fn notify(&self, candidate: Address) {
        let modulus = self.ring.modulus();
        let self_id = self.state.self_id();
        let candidate_id = candidate.identifier(modulus);
        let adopt = match self.state.predecessor() {
            None => true,
            Some(predecessor) => {
                in_range_open(candidate_id, predecessor.identifier(modulus), self_id, modulus)
            }
        };
        if adopt {
            debug!("notify: adopting {candidate} as predecessor");
            self.state.set_predecessor(Some(candidate));
        }
    }

    /// One stabilize round (§4.4 Stabilize).
    pub async fn stabilize(&self) {
        let self_address = self.state.self_address().clone();
        let modulus = self.ring.modulus();
        let self_id = self.state.self_id();

        let mut successor = self.state.immediate_successor();
        if successor != self_address && !self.peer(&successor).ping().await {
            warn!("stabilize: successor {successor} unreachable, evicting");
            self.state.evict_immediate_successor();
            successor = self.state.immediate_successor();
        }

        if successor == self_address {
            // Lone ring: there is no peer to ask for a predecessor, but a
            // notify since the last round may have given us one directly.
            // Adopting it here is what lets a seed node's successor ever
            // move off itself (§4.4 steps 2-3, degenerate when s == self).
            if let Some(candidate) = self.state.predecessor() {
                if self.peer(&candidate).ping().await {
                    debug!("stabilize: adopting {candidate} as new successor (was self)");
                    self.state.set_immediate_successor(candidate.clone());
                    successor = candidate;
                }
            }
        } else if let Ok(Some(candidate)) = self.peer(&successor).get_predecessor().await {
            let candidate_id = candidate.identifier(modulus);
            let successor_id = successor.identifier(modulus);
            if in_range_open(candidate_id, self_id, successor_id, modulus)
                && self.peer(&candidate).ping().await
            {
                debug!("stabilize: adopting {candidate} as new successor (was {successor})");
                self.state.set_immediate_successor(candidate.clone());
                successor = candidate;
            }
        }

        let successor_peer = self.peer(&successor);
        match successor_peer.get_successors().await {
            Ok(tail) => self.state.rebuild_successors(successor.clone(), &tail),
            Err(err) => warn!("stabilize: get_successors on {successor} failed: {err}"),
        }

        if let Err(err) = self.peer(&successor).notify(&self_address).await {
            warn!("stabilize: notify on {successor} failed: {err}");
        }
    }

    /// One fix_fingers tick (§4.4). `next` is the cursor maintained by the
    /// caller; returns the advanced cursor.
    pub async fn fix_fingers(&self, next: usize) -> usize {
        let m = self.state.finger_count();
        let next = (next + 1) % m;
        let start = self.state.finger_start(next);
        match self.find_successor(start).await {
            Ok(node) => self.state.set_finger_node(next, node),
            Err(err) => debug!("fix_fingers: find_successor({start}) failed: {err}"),
        }
        next
    }

    /// One check_predecessor tick (§4.4).
    pub async fn check_predecessor(&self) {
        if let Some(predecessor) = self.state.predecessor() {
            if !self.peer(&predecessor).ping().await {
                warn!("check_predecessor: {predecessor} unreachable, clearing");
                self.state.set_predecessor(None);
            }
        }
    }
}
