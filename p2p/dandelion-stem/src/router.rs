//! # Dandelion++ Router
//!
//! This module contains [`DandelionRouter`], the state holding the peer sets and the stem routes, and
//! [`SharedRouter`] which puts that state behind a single lock.
//!
//! Every connect and disconnect updates the peer sets and the routes in one critical section, so a reader
//! can never see a peer set that doesn't match the routes.
use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex},
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    registry::MembershipChange, shuffler::reassign_all, ConnectionDirection, ConnectionRegistry,
    Peer, RegistryError, RoutingTable,
};

/// An owned copy of the router state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RoutingSnapshot<ID: Hash + Eq> {
    /// The inbound peers, in connection order.
    pub inbound: Vec<ID>,
    /// The outbound peers, in connection order.
    pub outbound: Vec<ID>,
    /// Inbound peer -> outbound peer.
    pub routes: HashMap<ID, ID>,
    /// The destination for local transactions.
    pub local_route: Option<ID>,
}

/// The dandelion router state.
///
/// `R` is the random source used for every routing decision, it is generic so tests can use a seeded one.
#[derive(Debug)]
pub struct DandelionRouter<ID, R = StdRng> {
    registry: ConnectionRegistry<ID>,
    routes: RoutingTable<ID>,
    rng: R,

    /// The routers tracing span.
    span: tracing::Span,
}

impl<ID> Default for DandelionRouter<ID, StdRng>
where
    ID: Hash + Eq + Clone + Debug,
{
    fn default() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<ID, R> DandelionRouter<ID, R>
where
    ID: Hash + Eq + Clone + Debug,
    R: Rng,
{
    /// Creates a new [`DandelionRouter`] with no peers, using `rng` as its random source.
    pub fn new(rng: R) -> Self {
        Self {
            registry: ConnectionRegistry::default(),
            routes: RoutingTable::default(),
            rng,
            span: tracing::debug_span!("dandelion_router"),
        }
    }

    /// Registers a new peer, routing it if it's inbound.
    pub fn peer_connected(&mut self, peer: Peer<ID>) -> Result<(), RegistryError> {
        let change = match peer.direction {
            ConnectionDirection::Inbound => self.registry.add_inbound(peer)?,
            ConnectionDirection::Outbound => self.registry.add_outbound(peer)?,
        };

        self.apply(change);
        Ok(())
    }

    /// Removes a peer, redirecting any routes that pointed at it.
    ///
    /// Returns the direction of the removed connection.
    pub fn peer_disconnected(&mut self, id: &ID) -> Result<ConnectionDirection, RegistryError> {
        let direction = self
            .registry
            .get(id)
            .ok_or(RegistryError::NotConnected)?
            .direction;

        let change = match direction {
            ConnectionDirection::Inbound => self.registry.remove_inbound(id)?,
            ConnectionDirection::Outbound => self.registry.remove_outbound(id)?,
        };

        self.apply(change);
        Ok(direction)
    }

    /// Recomputes every route from scratch.
    pub fn shuffle(&mut self) {
        if self.registry.outbound_len() == 0 {
            return;
        }

        reassign_all(&mut self.routes, &self.registry, &mut self.rng);
        tracing::debug!(parent: &self.span, routes = self.routes.len(), "Shuffled stem routes.");

        self.check_invariants();
    }

    /// Returns true if this peer is a connected inbound peer.
    pub fn is_inbound(&self, id: &ID) -> bool {
        self.registry.is_inbound(id)
    }

    /// Returns the destination for stem transactions from this inbound peer.
    ///
    /// [`None`] means there are no outbound peers, or the peer is not a connected inbound peer.
    pub fn route(&self, inbound: &ID) -> Option<&ID> {
        self.routes.route(inbound)
    }

    /// Returns the destination for local transactions.
    pub fn local_route(&self) -> Option<&ID> {
        self.routes.local_route()
    }

    /// Returns the current peer registry.
    pub const fn registry(&self) -> &ConnectionRegistry<ID> {
        &self.registry
    }

    /// Returns an owned copy of the peer sets and routes.
    pub fn snapshot(&self) -> RoutingSnapshot<ID> {
        RoutingSnapshot {
            inbound: self.registry.inbound_ids().cloned().collect(),
            outbound: self.registry.outbound_ids().cloned().collect(),
            routes: self.routes.routes(),
            local_route: self.routes.local_route().cloned(),
        }
    }

    /// Applies a change to the peer sets to the routing table.
    fn apply(&mut self, change: MembershipChange<ID>) {
        match change {
            MembershipChange::InboundAdded(id) => {
                match self
                    .routes
                    .route_new_inbound(id.clone(), &self.registry, &mut self.rng)
                {
                    Some(destination) => {
                        tracing::debug!(parent: &self.span, peer = ?id, ?destination, "Routing new inbound peer.");
                    }
                    None => {
                        tracing::debug!(parent: &self.span, peer = ?id, "No outbound peers to route new inbound peer to.");
                    }
                }
            }
            MembershipChange::OutboundAdded { id, first } => {
                tracing::debug!(parent: &self.span, peer = ?id, "New outbound peer.");

                if first {
                    tracing::debug!(parent: &self.span, "First outbound peer, assigning all routes.");
                    reassign_all(&mut self.routes, &self.registry, &mut self.rng);
                }
            }
            MembershipChange::InboundRemoved(id) => {
                tracing::debug!(parent: &self.span, peer = ?id, "Inbound peer disconnected, removing its route.");
                self.routes.remove_inbound(&id);
            }
            MembershipChange::OutboundRemoved { id, remaining } => {
                match self
                    .routes
                    .redirect_outbound(&id, &self.registry, &mut self.rng)
                {
                    Some(replacement) => {
                        tracing::debug!(parent: &self.span, peer = ?id, ?replacement, "Outbound peer disconnected, redirecting its routes.");
                    }
                    None => {
                        debug_assert_eq!(remaining, 0);
                        tracing::debug!(parent: &self.span, peer = ?id, "Last outbound peer disconnected, dropping all routes.");
                    }
                }
            }
        }

        self.check_invariants();
    }

    fn check_invariants(&self) {
        if cfg!(debug_assertions) {
            self.routes.assert_invariants(&self.registry);
        }
    }
}

/// A [`DandelionRouter`] behind a lock, shared between the connection handlers and the message dispatcher.
///
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct SharedRouter<ID, R = StdRng>(pub(crate) Arc<Mutex<DandelionRouter<ID, R>>>);

impl<ID, R> Clone for SharedRouter<ID, R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<ID> Default for SharedRouter<ID, StdRng>
where
    ID: Hash + Eq + Clone + Debug,
{
    fn default() -> Self {
        Self::new(DandelionRouter::default())
    }
}

impl<ID, R> SharedRouter<ID, R>
where
    ID: Hash + Eq + Clone + Debug,
    R: Rng,
{
    /// Wraps a [`DandelionRouter`].
    pub fn new(router: DandelionRouter<ID, R>) -> Self {
        Self(Arc::new(Mutex::new(router)))
    }

    /// Runs `f` with exclusive access to the router.
    pub fn with<T>(&self, f: impl FnOnce(&mut DandelionRouter<ID, R>) -> T) -> T {
        f(&mut *self.0.lock().unwrap())
    }

    /// See [`DandelionRouter::peer_connected`].
    pub fn peer_connected(&self, peer: Peer<ID>) -> Result<(), RegistryError> {
        self.with(|router| router.peer_connected(peer))
    }

    /// See [`DandelionRouter::peer_disconnected`].
    pub fn peer_disconnected(&self, id: &ID) -> Result<ConnectionDirection, RegistryError> {
        self.with(|router| router.peer_disconnected(id))
    }

    /// See [`DandelionRouter::shuffle`].
    pub fn shuffle(&self) {
        self.with(DandelionRouter::shuffle);
    }

    /// Returns true if this peer is a connected inbound peer.
    pub fn is_inbound(&self, id: &ID) -> bool {
        self.with(|router| router.is_inbound(id))
    }

    /// Returns the destination for stem transactions from this peer, if it is a connected inbound peer.
    ///
    /// The outer [`None`] means the peer is not a connected inbound peer, the inner [`None`] means
    /// there are no outbound peers to route to.
    #[expect(clippy::option_option, reason = "the two cases are handled differently by the dispatcher")]
    pub fn inbound_route(&self, id: &ID) -> Option<Option<ID>> {
        self.with(|router| {
            router
                .is_inbound(id)
                .then(|| router.route(id).cloned())
        })
    }

    /// Returns the destination for local transactions.
    pub fn local_route(&self) -> Option<ID> {
        self.with(|router| router.local_route().cloned())
    }

    /// See [`DandelionRouter::snapshot`].
    pub fn snapshot(&self) -> RoutingSnapshot<ID> {
        self.with(|router| router.snapshot())
    }
}
