//! # Routing Table
//!
//! This module contains [`RoutingTable`], the map from inbound peers to the outbound peer their stem
//! transactions are relayed to, along with the destination for our own transactions.
//!
//! New destinations are always picked from the least loaded outbound peers, where the load of a peer is the
//! number of routes (including the local route) pointing at it. Ties are broken uniformly at random, a biased
//! tie-break would make our stem topology statistically distinguishable.
use std::{collections::HashMap, hash::Hash};

use indexmap::IndexMap;
use rand::{seq::SliceRandom, Rng};

use crate::ConnectionRegistry;

/// The stem routes of this node.
#[derive(Debug)]
pub(crate) struct RoutingTable<ID> {
    /// Inbound peer -> outbound peer.
    routes: HashMap<ID, ID>,
    /// The outbound peer our local transactions are sent to.
    local_route: Option<ID>,
}

impl<ID> Default for RoutingTable<ID> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            local_route: None,
        }
    }
}

impl<ID: Hash + Eq + Clone> RoutingTable<ID> {
    /// Returns the destination for stem transactions from this inbound peer.
    pub(crate) fn route(&self, inbound: &ID) -> Option<&ID> {
        self.routes.get(inbound)
    }

    /// Returns the destination for local transactions.
    pub(crate) const fn local_route(&self) -> Option<&ID> {
        self.local_route.as_ref()
    }

    /// The number of inbound peers with a route.
    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns the load of every connected outbound peer, in registry order.
    pub(crate) fn loads<'a>(&'a self, registry: &'a ConnectionRegistry<ID>) -> IndexMap<&'a ID, usize> {
        let mut loads: IndexMap<&ID, usize> = registry.outbound_ids().map(|id| (id, 0)).collect();

        for destination in self.routes.values().chain(self.local_route.iter()) {
            if let Some(load) = loads.get_mut(destination) {
                *load += 1;
            }
        }

        loads
    }

    /// Picks a destination uniformly at random from the least loaded outbound peers.
    ///
    /// Returns [`None`] only if there are no outbound peers.
    pub(crate) fn select_destination<R: Rng>(
        &self,
        registry: &ConnectionRegistry<ID>,
        rng: &mut R,
    ) -> Option<ID> {
        let loads = self.loads(registry);
        let min_load = loads.values().copied().min()?;

        let candidates = loads
            .into_iter()
            .filter(|(_, load)| *load == min_load)
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        candidates.choose(rng).map(|id| (*id).clone())
    }

    /// Routes a newly connected inbound peer.
    ///
    /// Does nothing if there are no outbound peers.
    pub(crate) fn route_new_inbound<R: Rng>(
        &mut self,
        inbound: ID,
        registry: &ConnectionRegistry<ID>,
        rng: &mut R,
    ) -> Option<ID> {
        let destination = self.select_destination(registry, rng)?;
        self.routes.insert(inbound, destination.clone());

        Some(destination)
    }

    /// Removes the route of a disconnected inbound peer.
    pub(crate) fn remove_inbound(&mut self, inbound: &ID) -> Option<ID> {
        self.routes.remove(inbound)
    }

    /// Redirects every route pointing at a disconnected outbound peer to a single new destination.
    ///
    /// The outbound peer must already be removed from the `registry`. If no outbound peers are left
    /// every route is dropped.
    #[expect(clippy::iter_over_hash_type, reason = "every matching route is updated, order doesn't matter")]
    pub(crate) fn redirect_outbound<R: Rng>(
        &mut self,
        removed: &ID,
        registry: &ConnectionRegistry<ID>,
        rng: &mut R,
    ) -> Option<ID> {
        let Some(replacement) = self.select_destination(registry, rng) else {
            self.clear();
            return None;
        };

        for destination in self.routes.values_mut() {
            if destination == removed {
                *destination = replacement.clone();
            }
        }

        if self.local_route.as_ref() == Some(removed) {
            self.local_route = Some(replacement.clone());
        }

        Some(replacement)
    }

    /// Sets a route, replacing any old one.
    pub(crate) fn insert(&mut self, inbound: ID, destination: ID) {
        self.routes.insert(inbound, destination);
    }

    /// Sets the local route.
    pub(crate) fn set_local_route(&mut self, destination: ID) {
        self.local_route = Some(destination);
    }

    /// Removes every route and the local route.
    pub(crate) fn clear(&mut self) {
        self.routes.clear();
        self.local_route = None;
    }

    /// Returns a copy of every route.
    pub(crate) fn routes(&self) -> HashMap<ID, ID> {
        self.routes.clone()
    }

    /// Checks the routing invariants against the `registry`.
    ///
    /// # Panics
    /// This panics if a route is keyed by a peer that is not a connected inbound peer, or points to a peer that
    /// is not a connected outbound peer, or if a route exists with no outbound peers.
    #[expect(clippy::iter_over_hash_type)]
    pub(crate) fn assert_invariants(&self, registry: &ConnectionRegistry<ID>) {
        if registry.outbound_len() == 0 {
            assert!(
                self.routes.is_empty() && self.local_route.is_none(),
                "Stem routes exist with no outbound peers."
            );
            return;
        }

        for (inbound, destination) in &self.routes {
            assert!(
                registry.is_inbound(inbound),
                "Stem route exists for a peer that is not a connected inbound peer."
            );
            assert!(
                registry.is_outbound(destination),
                "Stem route points to a peer that is not a connected outbound peer."
            );
        }

        if let Some(local_route) = &self.local_route {
            assert!(
                registry.is_outbound(local_route),
                "Local stem route points to a peer that is not a connected outbound peer."
            );
        }
    }
}
