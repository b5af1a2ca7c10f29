//! # Connection Registry
//!
//! This module contains [`ConnectionRegistry`] which keeps the current inbound and outbound peer sets.
//!
//! Every mutation returns a [`MembershipChange`], the [`DandelionRouter`](crate::DandelionRouter) applies
//! that change to the routing table before releasing its lock, so nothing can observe one without the other.
use std::hash::Hash;

use indexmap::IndexMap;

use crate::{ConnectionDirection, Peer};

/// An error returned from the [`ConnectionRegistry`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// The peer is already in one of the peer sets.
    #[error("The peer is already connected.")]
    AlreadyConnected,
    /// The peer is not in the expected peer set.
    #[error("The peer is not connected.")]
    NotConnected,
}

/// A structural change to the peer sets.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum MembershipChange<ID> {
    InboundAdded(ID),
    /// `first` is true if this is now the only outbound peer.
    OutboundAdded { id: ID, first: bool },
    InboundRemoved(ID),
    /// `remaining` is the number of outbound peers left.
    OutboundRemoved { id: ID, remaining: usize },
}

/// The set of currently connected peers, split by direction.
///
/// Insertion order is kept so routing decisions are reproducible with a seeded random source.
#[derive(Debug)]
pub struct ConnectionRegistry<ID> {
    inbound: IndexMap<ID, Peer<ID>>,
    outbound: IndexMap<ID, Peer<ID>>,
}

impl<ID> Default for ConnectionRegistry<ID> {
    fn default() -> Self {
        Self {
            inbound: IndexMap::new(),
            outbound: IndexMap::new(),
        }
    }
}

impl<ID: Hash + Eq + Clone> ConnectionRegistry<ID> {
    /// Returns true if this peer is connected in either direction.
    pub fn contains(&self, id: &ID) -> bool {
        self.inbound.contains_key(id) || self.outbound.contains_key(id)
    }

    /// Returns the peer with this ID.
    pub fn get(&self, id: &ID) -> Option<&Peer<ID>> {
        self.inbound.get(id).or_else(|| self.outbound.get(id))
    }

    /// Returns true if this peer is a connected inbound peer.
    pub fn is_inbound(&self, id: &ID) -> bool {
        self.inbound.contains_key(id)
    }

    /// Returns true if this peer is a connected outbound peer.
    pub fn is_outbound(&self, id: &ID) -> bool {
        self.outbound.contains_key(id)
    }

    /// The number of inbound peers.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// The number of outbound peers.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub(crate) fn inbound_ids(&self) -> impl Iterator<Item = &ID> {
        self.inbound.keys()
    }

    pub(crate) fn outbound_ids(&self) -> impl Iterator<Item = &ID> {
        self.outbound.keys()
    }

    pub(crate) fn add_inbound(&mut self, peer: Peer<ID>) -> Result<MembershipChange<ID>, RegistryError> {
        debug_assert_eq!(peer.direction, ConnectionDirection::Inbound);

        if self.contains(&peer.id) {
            return Err(RegistryError::AlreadyConnected);
        }

        let id = peer.id.clone();
        self.inbound.insert(id.clone(), peer);

        Ok(MembershipChange::InboundAdded(id))
    }

    pub(crate) fn add_outbound(&mut self, peer: Peer<ID>) -> Result<MembershipChange<ID>, RegistryError> {
        debug_assert_eq!(peer.direction, ConnectionDirection::Outbound);

        if self.contains(&peer.id) {
            return Err(RegistryError::AlreadyConnected);
        }

        let id = peer.id.clone();
        self.outbound.insert(id.clone(), peer);

        Ok(MembershipChange::OutboundAdded {
            id,
            first: self.outbound.len() == 1,
        })
    }

    pub(crate) fn remove_inbound(&mut self, id: &ID) -> Result<MembershipChange<ID>, RegistryError> {
        let peer = self
            .inbound
            .shift_remove(id)
            .ok_or(RegistryError::NotConnected)?;

        Ok(MembershipChange::InboundRemoved(peer.id))
    }

    pub(crate) fn remove_outbound(&mut self, id: &ID) -> Result<MembershipChange<ID>, RegistryError> {
        let peer = self
            .outbound
            .shift_remove(id)
            .ok_or(RegistryError::NotConnected)?;

        Ok(MembershipChange::OutboundRemoved {
            id: peer.id,
            remaining: self.outbound.len(),
        })
    }
}
