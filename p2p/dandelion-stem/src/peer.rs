//! Peer identities as seen by the stem router.
use std::time::Instant;

/// The direction of a connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConnectionDirection {
    /// A connection initiated by the remote side.
    Inbound,
    /// A connection initiated by our node.
    Outbound,
}

/// A connected peer.
#[derive(Debug, Clone)]
pub struct Peer<ID> {
    /// The peer's identity.
    pub id: ID,
    /// Who opened the connection.
    pub direction: ConnectionDirection,
    /// When the connection was registered.
    pub connected_at: Instant,
}

impl<ID> Peer<ID> {
    /// Creates a new [`Peer`] connected now.
    pub fn new(id: ID, direction: ConnectionDirection) -> Self {
        Self {
            id,
            direction,
            connected_at: Instant::now(),
        }
    }

    /// Creates a new inbound [`Peer`].
    pub fn inbound(id: ID) -> Self {
        Self::new(id, ConnectionDirection::Inbound)
    }

    /// Creates a new outbound [`Peer`].
    pub fn outbound(id: ID) -> Self {
        Self::new(id, ConnectionDirection::Outbound)
    }
}
