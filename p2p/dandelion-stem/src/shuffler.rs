//! # Route Shuffler
//!
//! Full recomputation of the stem routes, run when the first outbound peer connects and periodically after that.
//!
//! Unlike the redirect done when an outbound peer disconnects, every route here is picked independently.
use std::{hash::Hash, sync::Arc};

use rand::Rng;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::Instrument;

use crate::{ConnectionRegistry, DandelionConfig, RoutingTable, SharedRouter};

/// Reassigns every inbound peer and the local route to a least loaded outbound peer.
///
/// Does nothing but clear the routes if there are no outbound peers.
pub(crate) fn reassign_all<ID: Hash + Eq + Clone, R: Rng>(
    routes: &mut RoutingTable<ID>,
    registry: &ConnectionRegistry<ID>,
    rng: &mut R,
) {
    routes.clear();

    if registry.outbound_len() == 0 {
        return;
    }

    for inbound in registry.inbound_ids() {
        let destination = routes
            .select_destination(registry, rng)
            .expect("No outbound peers, but the outbound set is not empty");

        routes.insert(inbound.clone(), destination);
    }

    let local_route = routes
        .select_destination(registry, rng)
        .expect("No outbound peers, but the outbound set is not empty");
    routes.set_local_route(local_route);
}

/// Spawns a task which shuffles the routes of `router` every [`DandelionConfig::shuffle_interval`].
///
/// The task exits once every handle to the router has been dropped.
pub fn spawn_shuffler<ID, R>(router: &SharedRouter<ID, R>, config: &DandelionConfig) -> JoinHandle<()>
where
    ID: Hash + Eq + Clone + std::fmt::Debug + Send + 'static,
    R: Rng + Send + 'static,
{
    let router = Arc::downgrade(&router.0);
    let period = config.shuffle_interval;

    let span = tracing::debug_span!("dandelion_shuffler");

    tokio::spawn(
        async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let Some(router) = router.upgrade() else {
                    tracing::debug!("Router dropped, stopping shuffler.");
                    return;
                };

                tracing::trace!("Shuffling stem routes.");
                SharedRouter(router).shuffle();
            }
        }
        .instrument(span),
    )
}
