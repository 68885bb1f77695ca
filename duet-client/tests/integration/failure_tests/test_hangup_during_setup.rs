use duet_client::{ClientConfig, NegotiationState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::integration::{init_tracing, start_pair, wait_state};
use crate::utils::{FakeMedia, FakeNetwork, MediaMode};

#[tokio::test]
async fn test_hangup_while_acquiring_media() {
    init_tracing();

    let gate = Arc::new(Notify::new());
    let a1_media = FakeMedia::new(MediaMode::Gated(gate.clone()));
    let pair = start_pair(
        FakeNetwork::new(),
        a1_media.clone(),
        FakeMedia::granting(),
        ClientConfig::default(),
    )
    .await;

    wait_state(&pair.a1, NegotiationState::Negotiating).await;
    pair.a1.hang_up().await.expect("session closed");

    let a1 = wait_state(&pair.a1, NegotiationState::Closed).await;
    assert_eq!(a1.partner_id, None);
    wait_state(&pair.b2, NegotiationState::Closed).await;

    // The permission prompt resolves after the session is already gone.
    gate.notify_one();

    tokio::time::timeout(Duration::from_secs(5), async {
        while a1_media.handed_out() == 0 || !a1_media.all_released() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("late media was never released");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pair.a1.snapshot().state, NegotiationState::Closed);
    for i in 0..pair.network.peer_count() {
        assert!(pair.network.peer(i).is_closed());
    }
}
