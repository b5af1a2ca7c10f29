//! # Dandelion Stem
//!
//! This crate implements the stem routing part of [dandelion++](https://arxiv.org/pdf/1805.11060.pdf).
//!
//! Every inbound peer is routed to exactly one outbound peer, stem transactions received from an inbound peer
//! are relayed to its destination, and our own transactions are relayed to a separate local destination.
//!
//! # Routing
//!
//! Destinations are picked uniformly at random from the least loaded outbound peers, the load of an outbound
//! peer being the number of routes pointing at it. Routes change when:
//!
//! - an inbound peer connects: it gets a route.
//! - the first outbound peer connects: every route is assigned, see [`spawn_shuffler`].
//! - an inbound peer disconnects: its route is removed.
//! - an outbound peer disconnects: every route pointing at it is redirected to the *same* new destination.
//! - the last outbound peer disconnects: all routes are dropped, stem transactions get fluffed.
//!
//! The peer sets and the routes live in one [`DandelionRouter`] behind one lock ([`SharedRouter`]), so a
//! connection event and its routing update are a single atomic step.
//!
//! # Needed Services
//!
//! ## Validator Service
//!
//! Transactions entering the [`StemPool`] are checked by a validator service, this should apply the same rules
//! as the public pool.
//!
//! The validator service should have a request of [`ValidateRequest`](traits::ValidateRequest), a response of
//! [`TxValidity`](traits::TxValidity) and its error should be [`tower::BoxError`].
//!
//! ## Send Path
//!
//! This crate does not do any network IO. Transactions to announce to a peer are queued, the send path should
//! take them with [`MessageDispatcher::drain_send_queue`]. Transactions that need to be diffused are handed
//! back as [`Forward::Fluff`] or from [`MessageDispatcher::take_expired_stem_txs`].
mod config;
mod dispatcher;
mod embargo;
mod inventory;
mod peer;
mod registry;
mod router;
mod routing;
mod shuffler;
mod stem_pool;
#[cfg(test)]
mod tests;
pub mod traits;

pub use config::DandelionConfig;
pub use dispatcher::{DispatchError, Forward, LocalTxOutcome, MessageDispatcher, StemTxOutcome};
pub use embargo::{EmbargoPolicy, ExponentialEmbargo, FixedEmbargo};
pub use inventory::{InventoryTracker, QueueResult};
pub use peer::{ConnectionDirection, Peer};
pub use registry::{ConnectionRegistry, RegistryError};
pub use router::{DandelionRouter, RoutingSnapshot, SharedRouter};
pub(crate) use routing::RoutingTable;
pub use shuffler::spawn_shuffler;
pub use stem_pool::{AcceptResult, StemPool, StemPoolEntry};
