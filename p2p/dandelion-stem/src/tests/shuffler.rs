use std::time::Duration;

use crate::{spawn_shuffler, DandelionConfig, Peer, SharedRouter};

use super::*;

#[tokio::test(start_paused = true)]
async fn shuffler_rebalances_on_timer() {
    const PERIOD: Duration = Duration::from_secs(600);

    let router = SharedRouter::new(seeded_router(6));

    for id in 1..=7 {
        router.peer_connected(Peer::inbound(id)).unwrap();
    }
    router.peer_connected(Peer::outbound(10)).unwrap();
    router.peer_connected(Peer::outbound(11)).unwrap();

    let config = DandelionConfig {
        shuffle_interval: PERIOD,
        ..Default::default()
    };
    let handle = spawn_shuffler(&router, &config);

    // nothing happens before the first tick.
    tokio::time::sleep(PERIOD / 2).await;
    assert_eq!(loads(&router.snapshot()), vec![8, 0]);

    tokio::time::sleep(PERIOD).await;

    let snapshot = router.snapshot();
    assert_eq!(loads(&snapshot), vec![4, 4]);
    assert_snapshot_consistent(&snapshot);

    drop(router);

    // the shuffler notices the router is gone on its next tick.
    tokio::time::timeout(PERIOD * 2, handle)
        .await
        .unwrap()
        .unwrap();
}
