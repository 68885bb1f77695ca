use duet_client::{AppState, NegotiationState};
use std::time::Duration;

use crate::integration::{connected_pair, init_tracing, wait_state};

#[tokio::test]
async fn test_hangup_closes_both_sides() {
    init_tracing();

    let pair = connected_pair().await;

    pair.a1.hang_up().await.expect("session closed");

    let a1 = wait_state(&pair.a1, NegotiationState::Closed).await;
    let b2 = wait_state(&pair.b2, NegotiationState::Closed).await;

    assert_eq!(a1.app_state, AppState::Disconnected);
    assert_eq!(a1.partner_id, None);
    assert_eq!(b2.partner_id, None);
    assert_eq!(a1.remote_stream, None);
    assert!(!b2.chat_ready);

    // user_left goes to b2 only.
    assert_eq!(pair.bridge.user_left_count("b2"), 1);
    assert_eq!(pair.bridge.user_left_count("a1"), 0);

    let lobby = pair.bridge.lobby().snapshot().await.expect("lobby closed");
    assert!(lobby.pairs.is_empty());
    assert!(lobby.waiting.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(pair.a1_media.all_released());
    assert!(pair.b2_media.all_released());
    for i in 0..pair.network.peer_count() {
        assert!(pair.network.peer(i).is_closed());
    }
}

#[tokio::test]
async fn test_next_hangs_up_and_searches_again() {
    init_tracing();

    let pair = connected_pair().await;

    pair.a1.start_search().await.expect("session closed");

    wait_state(&pair.a1, NegotiationState::AwaitingMatch).await;
    wait_state(&pair.b2, NegotiationState::Closed).await;
    assert_eq!(pair.bridge.user_left_count("b2"), 1);
}

#[tokio::test]
async fn test_hangup_while_searching_leaves_pool() {
    init_tracing();

    let pair = connected_pair().await;
    pair.b2.hang_up().await.expect("session closed");
    wait_state(&pair.a1, NegotiationState::Closed).await;

    pair.a1.start_search().await.expect("session closed");
    crate::integration::wait_waiting(&pair.bridge, "a1").await;

    pair.a1.hang_up().await.expect("session closed");
    let a1 = wait_state(&pair.a1, NegotiationState::Idle).await;
    assert_eq!(a1.app_state, AppState::Idle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let lobby = pair.bridge.lobby().snapshot().await.expect("lobby closed");
    assert!(lobby.waiting.is_empty());
}
