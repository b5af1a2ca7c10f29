//! # Inventory Tracker
//!
//! Keeps, per connected peer, the stem transactions that peer already knows about (sent to or received from
//! it) and the queue of stem transactions waiting to be announced to it.
//!
//! Internally this is a [`DashMap`] which means care should be taken in `async` code as internally this uses
//! blocking `RwLock`s, no reference into the tracker is held across an `.await` here.
use std::{collections::HashSet, hash::Hash};

use dashmap::DashMap;

/// The result of trying to queue a transaction for a peer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueueResult {
    /// The transaction was added to the peer's send queue.
    Queued,
    /// The peer already knows this transaction, or it's already queued.
    AlreadyKnown,
    /// The peer is not tracked, it has disconnected.
    UnknownPeer,
}

/// The inventory state of a single peer.
#[derive(Debug)]
struct PeerInventory<TxId> {
    /// Transactions sent to or received from this peer.
    known: HashSet<TxId>,
    /// Transactions waiting to be sent to this peer, in order.
    send_queue: Vec<TxId>,
}

impl<TxId> Default for PeerInventory<TxId> {
    fn default() -> Self {
        Self {
            known: HashSet::new(),
            send_queue: Vec::new(),
        }
    }
}

/// Per peer known inventory and send queues.
#[derive(Debug)]
pub struct InventoryTracker<ID: Hash + Eq, TxId> {
    peers: DashMap<ID, PeerInventory<TxId>>,
}

impl<ID: Hash + Eq, TxId> Default for InventoryTracker<ID, TxId> {
    fn default() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }
}

impl<ID, TxId> InventoryTracker<ID, TxId>
where
    ID: Hash + Eq + Clone,
    TxId: Hash + Eq + Clone,
{
    /// Starts tracking a newly connected peer.
    ///
    /// Returns `false` if the peer was already tracked, its state is kept.
    pub fn track_peer(&self, peer: ID) -> bool {
        let mut new = false;
        self.peers.entry(peer).or_insert_with(|| {
            new = true;
            PeerInventory::default()
        });
        new
    }

    /// Stops tracking a disconnected peer, dropping its known set and send queue.
    pub fn forget_peer(&self, peer: &ID) {
        self.peers.remove(peer);
    }

    /// Returns true if this peer is tracked.
    pub fn is_tracked(&self, peer: &ID) -> bool {
        self.peers.contains_key(peer)
    }

    /// Marks a transaction as known by this peer.
    ///
    /// Returns `true` if the transaction was not already known by the peer, `false` if it was or if the peer
    /// is not tracked.
    pub fn mark_known(&self, peer: &ID, tx_id: TxId) -> bool {
        self.peers
            .get_mut(peer)
            .is_some_and(|mut inv| inv.known.insert(tx_id))
    }

    /// Returns true if this peer knows this transaction.
    pub fn knows(&self, peer: &ID, tx_id: &TxId) -> bool {
        self.peers
            .get(peer)
            .is_some_and(|inv| inv.known.contains(tx_id))
    }

    /// Adds a transaction to a peer's send queue, if the peer doesn't already know it and it isn't queued.
    pub fn queue_if_unknown(&self, peer: &ID, tx_id: TxId) -> QueueResult {
        let Some(mut inv) = self.peers.get_mut(peer) else {
            return QueueResult::UnknownPeer;
        };

        if inv.known.contains(&tx_id) || inv.send_queue.contains(&tx_id) {
            return QueueResult::AlreadyKnown;
        }

        inv.send_queue.push(tx_id);
        QueueResult::Queued
    }

    /// Takes every queued transaction for this peer, in the order they were queued.
    ///
    /// The transactions are marked as known by the peer.
    pub fn drain_send_queue(&self, peer: &ID) -> Vec<TxId> {
        let Some(mut inv) = self.peers.get_mut(peer) else {
            return Vec::new();
        };

        let inv = &mut *inv;
        let drained = std::mem::take(&mut inv.send_queue);
        inv.known.extend(drained.iter().cloned());

        drained
    }

    /// Returns the amount of transactions queued for this peer.
    pub fn queued(&self, peer: &ID) -> usize {
        self.peers.get(peer).map_or(0, |inv| inv.send_queue.len())
    }
}
