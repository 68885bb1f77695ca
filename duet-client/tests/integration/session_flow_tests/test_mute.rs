use crate::integration::{connected_pair, init_tracing, wait_state};
use duet_client::NegotiationState;

#[tokio::test]
async fn test_mute_toggle() {
    init_tracing();

    let pair = connected_pair().await;

    assert!(pair.a1.toggle_mute().await.expect("session closed"));
    assert!(pair.a1.snapshot().muted);
    // Local only; the partner's state is untouched.
    assert!(!pair.b2.snapshot().muted);
    assert_eq!(pair.b2.snapshot().state, NegotiationState::Connected);

    assert!(!pair.a1.toggle_mute().await.expect("session closed"));
    assert!(!pair.a1.snapshot().muted);
}

#[tokio::test]
async fn test_mute_resets_after_teardown() {
    init_tracing();

    let pair = connected_pair().await;
    assert!(pair.a1.toggle_mute().await.expect("session closed"));

    pair.a1.hang_up().await.expect("session closed");
    let a1 = wait_state(&pair.a1, NegotiationState::Closed).await;

    assert!(!a1.muted);
    assert!(!pair.a1.toggle_mute().await.expect("session closed"));
}
