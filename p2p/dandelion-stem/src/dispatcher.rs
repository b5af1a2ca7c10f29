//! # Message Dispatcher
//!
//! This module contains [`MessageDispatcher`], which handles connection events and the dandelion messages
//! received from peers, using the router to decide where stem transactions go.
//!
//! ### Stem Transactions
//!
//! A stem transaction from an inbound peer goes down one of two paths:
//!
//! - if it's new it is validated and added to the stem pool,
//! - if it's in the stem pool (including just added) it is queued for the inbound peer's destination,
//!   unless the destination already knows it.
//!
//! So a duplicate arrival is still forwarded, the destination's known inventory stops it being sent twice.
//!
//! ### Degraded Mode
//!
//! With no outbound peers there is nowhere to stem to, the transaction is taken out of the stem pool and
//! [`Forward::Fluff`] is returned so the caller can diffuse it.
use std::{fmt::Debug, hash::Hash, sync::Arc, time::Instant};

use rand::{rngs::StdRng, Rng};
use tower::Service;

use crate::{
    inventory::QueueResult,
    stem_pool::AcceptResult,
    traits::{RequestData, TxValidity, ValidateRequest},
    ConnectionDirection, InventoryTracker, Peer, RegistryError, SharedRouter, StemPool,
};

/// An error returned from the [`MessageDispatcher`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The validator service returned an error.
    #[error("The transaction validator returned an err: {0}.")]
    Validator(tower::BoxError),
}

/// What happened to a transaction after it was added to, or found in, the stem pool.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Forward<ID> {
    /// The transaction was queued to be sent to this peer.
    Queued(ID),
    /// This peer already knows the transaction, nothing was queued.
    AlreadyKnown(ID),
    /// There are no outbound peers, the transaction was removed from the stem pool and must be diffused.
    Fluff,
}

/// The outcome of handling a stem transaction from a peer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StemTxOutcome<ID> {
    /// The transaction was new and added to the stem pool.
    Accepted(Forward<ID>),
    /// The transaction was already in the stem pool.
    Duplicate(Forward<ID>),
    /// The transaction is invalid, it was dropped.
    Rejected,
    /// The peer is not a connected inbound peer, the transaction was dropped.
    NotInbound,
}

/// The outcome of handling a transaction created by our node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LocalTxOutcome<ID> {
    /// The transaction was new and added to the stem pool.
    Accepted(Forward<ID>),
    /// The transaction was already in the stem pool.
    Duplicate(Forward<ID>),
    /// The transaction is invalid, it was dropped.
    Rejected,
}

/// Handles dandelion++ messages and peer connection events.
///
/// Cloning a [`MessageDispatcher`] gives another handle to the same state.
pub struct MessageDispatcher<ID: Hash + Eq, TxId: Hash + Eq, Tx, V, R = StdRng> {
    router: SharedRouter<ID, R>,
    inventory: Arc<InventoryTracker<ID, TxId>>,
    stem_pool: Arc<StemPool<TxId, Tx, V>>,
}

impl<ID: Hash + Eq, TxId: Hash + Eq, Tx, V, R> Clone for MessageDispatcher<ID, TxId, Tx, V, R> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            inventory: Arc::clone(&self.inventory),
            stem_pool: Arc::clone(&self.stem_pool),
        }
    }
}

impl<ID, TxId, Tx, V, R> MessageDispatcher<ID, TxId, Tx, V, R>
where
    ID: Hash + Eq + Clone + Debug,
    TxId: Hash + Eq + Clone + Debug,
    Tx: Clone,
    V: Service<ValidateRequest<Tx>, Response = TxValidity, Error = tower::BoxError> + Clone,
    R: Rng,
{
    /// Creates a new [`MessageDispatcher`].
    pub fn new(router: SharedRouter<ID, R>, stem_pool: StemPool<TxId, Tx, V>) -> Self {
        Self {
            router,
            inventory: Arc::new(InventoryTracker::default()),
            stem_pool: Arc::new(stem_pool),
        }
    }

    /// Returns the router.
    pub const fn router(&self) -> &SharedRouter<ID, R> {
        &self.router
    }

    /// Returns the inventory tracker.
    pub fn inventory(&self) -> &InventoryTracker<ID, TxId> {
        &self.inventory
    }

    /// Returns the stem pool.
    pub fn stem_pool(&self) -> &StemPool<TxId, Tx, V> {
        &self.stem_pool
    }

    /// Handles a new connection.
    ///
    /// The peer's inventory is tracked in the same critical section as the routing update, so a peer is
    /// tracked exactly while it is registered with the router.
    pub fn peer_connected(&self, id: ID, direction: ConnectionDirection) -> Result<(), RegistryError> {
        self.router.with(|router| {
            router.peer_connected(Peer::new(id.clone(), direction))?;
            self.inventory.track_peer(id);

            Ok(())
        })
    }

    /// Handles a closed connection.
    pub fn peer_disconnected(&self, id: &ID) -> Result<ConnectionDirection, RegistryError> {
        self.router.with(|router| {
            let direction = router.peer_disconnected(id)?;
            self.inventory.forget_peer(id);

            Ok(direction)
        })
    }

    /// Recomputes every stem route.
    pub fn shuffle(&self) {
        self.router.shuffle();
    }

    /// Handles a stem transaction advertisement.
    ///
    /// Returns the data request to send back, if this is the first time `from` advertised this transaction.
    pub fn on_inventory_advertised(&self, from: &ID, tx_id: TxId) -> Option<RequestData<ID, TxId>> {
        if !self.inventory.mark_known(from, tx_id.clone()) {
            tracing::trace!(peer = ?from, ?tx_id, "Peer already advertised stem transaction.");
            return None;
        }

        Some(RequestData {
            peer: from.clone(),
            tx_id,
        })
    }

    /// Handles a stem transaction received from a peer.
    #[tracing::instrument(level = "debug", skip_all, fields(peer = ?from, ?tx_id))]
    pub async fn on_stem_transaction_received(
        &self,
        from: &ID,
        tx_id: TxId,
        tx: Tx,
    ) -> Result<StemTxOutcome<ID>, DispatchError> {
        if !self.router.is_inbound(from) {
            tracing::debug!("Received stem transaction from a peer that is not inbound, dropping it.");
            return Ok(StemTxOutcome::NotInbound);
        }

        // We don't want to send this tx back to the peer that sent it.
        self.inventory.mark_known(from, tx_id.clone());

        let newly_accepted = if self.stem_pool.exists(&tx_id) {
            false
        } else {
            match self
                .stem_pool
                .insert(tx_id.clone(), tx)
                .await
                .map_err(DispatchError::Validator)?
            {
                AcceptResult::Accepted => true,
                AcceptResult::Duplicate => false,
                AcceptResult::Rejected => {
                    tracing::debug!("Stem transaction rejected, not forwarding.");
                    return Ok(StemTxOutcome::Rejected);
                }
            }
        };

        let mut vanished = None;
        let forward = loop {
            let Some(route) = self.router.inbound_route(from) else {
                // The peer disconnected while we were validating its transaction.
                tracing::debug!("Peer disconnected before stem transaction was routed.");
                return Ok(StemTxOutcome::NotInbound);
            };

            match self.forward_to(route, &tx_id, vanished.as_ref()) {
                Ok(forward) => break forward,
                Err(destination) => vanished = Some(destination),
            }
        };

        Ok(if newly_accepted {
            StemTxOutcome::Accepted(forward)
        } else {
            StemTxOutcome::Duplicate(forward)
        })
    }

    /// Handles a transaction created by our node.
    #[tracing::instrument(level = "debug", skip_all, fields(?tx_id))]
    pub async fn submit_local_transaction(
        &self,
        tx_id: TxId,
        tx: Tx,
    ) -> Result<LocalTxOutcome<ID>, DispatchError> {
        let accept_result = self
            .stem_pool
            .insert(tx_id.clone(), tx)
            .await
            .map_err(DispatchError::Validator)?;

        if accept_result == AcceptResult::Rejected {
            tracing::debug!("Local transaction rejected.");
            return Ok(LocalTxOutcome::Rejected);
        }

        let mut vanished = None;
        let forward = loop {
            match self.forward_to(self.router.local_route(), &tx_id, vanished.as_ref()) {
                Ok(forward) => break forward,
                Err(destination) => vanished = Some(destination),
            }
        };

        if forward == Forward::Fluff {
            tracing::warn!("No outbound connections to stem local tx to, fluffing instead, privacy will be degraded.");
        }

        Ok(match accept_result {
            AcceptResult::Accepted => LocalTxOutcome::Accepted(forward),
            AcceptResult::Duplicate | AcceptResult::Rejected => LocalTxOutcome::Duplicate(forward),
        })
    }

    /// Queues a transaction for `destination`.
    ///
    /// Returns `Err(destination)` if the destination disconnected after it was looked up, the route should be
    /// looked up again. If the new route is `vanished`, the destination that just failed, the router and the
    /// inventory tracker disagree about the peer and the transaction is fluffed instead.
    fn forward_to(
        &self,
        destination: Option<ID>,
        tx_id: &TxId,
        vanished: Option<&ID>,
    ) -> Result<Forward<ID>, ID> {
        let Some(destination) = destination else {
            return Ok(self.fluff(tx_id));
        };

        if vanished == Some(&destination) {
            tracing::warn!(?destination, "Stem route points to a peer with no inventory, fluffing.");
            return Ok(self.fluff(tx_id));
        }

        match self.inventory.queue_if_unknown(&destination, tx_id.clone()) {
            QueueResult::Queued => {
                tracing::trace!(?destination, "Queued stem transaction.");
                Ok(Forward::Queued(destination))
            }
            QueueResult::AlreadyKnown => Ok(Forward::AlreadyKnown(destination)),
            QueueResult::UnknownPeer => Err(destination),
        }
    }

    /// Takes a transaction out of the stem pool so the caller can diffuse it.
    fn fluff(&self, tx_id: &TxId) -> Forward<ID> {
        self.stem_pool.remove(tx_id);
        Forward::Fluff
    }

    /// Takes every transaction queued to be announced to this peer.
    pub fn drain_send_queue(&self, peer: &ID) -> Vec<TxId> {
        self.inventory.drain_send_queue(peer)
    }

    /// Returns a stem transaction requested by `peer`.
    ///
    /// Stem transactions are only given to peers we announced them to, or that sent them to us.
    pub fn stem_tx_for_peer(&self, peer: &ID, tx_id: &TxId) -> Option<Tx> {
        if !self.inventory.knows(peer, tx_id) {
            return None;
        }

        self.stem_pool.get(tx_id)
    }

    /// Removes and returns every stem transaction whose embargo timer has fired, these must be diffused.
    pub fn take_expired_stem_txs(&self) -> Vec<(TxId, Tx)> {
        let expired = self.stem_pool.take_expired(Instant::now());

        if !expired.is_empty() {
            tracing::debug!("Embargo timer fired for {} stem transactions, fluffing them.", expired.len());
        }

        expired
    }
}
