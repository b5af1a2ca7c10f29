mod shuffler;

use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tower::{util::service_fn, Service};

use crate::{
    traits::{TxValidity, ValidateRequest},
    ConnectionDirection, DandelionRouter, FixedEmbargo, MessageDispatcher, RoutingSnapshot,
    SharedRouter, StemPool,
};

/// A validator that accepts even transactions and rejects odd ones.
pub(crate) fn mock_validator_svc(
) -> impl Service<ValidateRequest<u64>, Response = TxValidity, Error = tower::BoxError> + Clone {
    service_fn(|ValidateRequest(tx): ValidateRequest<u64>| {
        futures::future::ready(Ok::<_, tower::BoxError>(if tx % 2 == 0 {
            TxValidity::Valid
        } else {
            TxValidity::Invalid
        }))
    })
}

pub(crate) fn seeded_router(seed: u64) -> DandelionRouter<u32, StdRng> {
    DandelionRouter::new(StdRng::seed_from_u64(seed))
}

/// A dispatcher with a seeded router, the mock validator and the given embargo timeout.
pub(crate) fn mock_dispatcher(
    seed: u64,
    embargo: Duration,
) -> MessageDispatcher<
    u32,
    u64,
    u64,
    impl Service<ValidateRequest<u64>, Response = TxValidity, Error = tower::BoxError> + Clone,
    StdRng,
> {
    MessageDispatcher::new(
        SharedRouter::new(seeded_router(seed)),
        StemPool::new(mock_validator_svc(), FixedEmbargo(embargo)),
    )
}

/// Connects peers to a dispatcher, panicking on error.
pub(crate) fn connect<V>(
    dispatcher: &MessageDispatcher<u32, u64, u64, V, StdRng>,
    inbound: &[u32],
    outbound: &[u32],
) where
    V: Service<ValidateRequest<u64>, Response = TxValidity, Error = tower::BoxError> + Clone,
{
    for id in inbound {
        dispatcher
            .peer_connected(*id, ConnectionDirection::Inbound)
            .unwrap();
    }
    for id in outbound {
        dispatcher
            .peer_connected(*id, ConnectionDirection::Outbound)
            .unwrap();
    }
}

/// Checks every routing invariant that must hold between connection events.
pub(crate) fn assert_snapshot_consistent(snapshot: &RoutingSnapshot<u32>) {
    if snapshot.outbound.is_empty() {
        assert!(snapshot.routes.is_empty());
        assert_eq!(snapshot.local_route, None);
        return;
    }

    // every inbound peer has exactly one route, to a connected outbound peer.
    assert_eq!(snapshot.routes.len(), snapshot.inbound.len());
    for inbound in &snapshot.inbound {
        let destination = snapshot.routes.get(inbound).unwrap();
        assert!(snapshot.outbound.contains(destination));
    }

    let local_route = snapshot.local_route.unwrap();
    assert!(snapshot.outbound.contains(&local_route));
}

/// Returns the load of each outbound peer, in connection order.
pub(crate) fn loads(snapshot: &RoutingSnapshot<u32>) -> Vec<usize> {
    snapshot
        .outbound
        .iter()
        .map(|outbound| {
            snapshot
                .routes
                .values()
                .chain(snapshot.local_route.iter())
                .filter(|destination| *destination == outbound)
                .count()
        })
        .collect()
}
