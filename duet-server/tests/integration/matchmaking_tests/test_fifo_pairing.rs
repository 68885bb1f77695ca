use duet_core::ClientId;

use crate::integration::{create_test_lobby, init_tracing, matched, next_delivery};

#[tokio::test]
async fn test_fifo_pairing() {
    init_tracing();

    let (lobby, mut delivered_rx, signaling) = create_test_lobby();

    for id in ["a", "b", "c"] {
        lobby.join(ClientId::from(id)).await.expect("lobby closed");
    }

    assert_eq!(next_delivery(&mut delivered_rx).await, matched("b", "a"));
    assert_eq!(next_delivery(&mut delivered_rx).await, matched("a", "b"));

    let snapshot = lobby.snapshot().await.expect("lobby closed");
    assert_eq!(snapshot.waiting, vec![ClientId::from("c")]);
    assert_eq!(
        snapshot.pairs,
        vec![(ClientId::from("a"), ClientId::from("b"))]
    );
    assert!(signaling.events_for(&ClientId::from("c")).await.is_empty());
}

#[tokio::test]
async fn test_repeated_join_is_ignored() {
    init_tracing();

    let (lobby, mut delivered_rx, signaling) = create_test_lobby();
    let a1 = ClientId::from("a1");
    let b2 = ClientId::from("b2");

    lobby.join(a1.clone()).await.expect("lobby closed");
    lobby.join(a1.clone()).await.expect("lobby closed");
    lobby.join(b2.clone()).await.expect("lobby closed");
    lobby.join(b2.clone()).await.expect("lobby closed");

    assert_eq!(next_delivery(&mut delivered_rx).await, matched("b2", "a1"));
    assert_eq!(next_delivery(&mut delivered_rx).await, matched("a1", "b2"));

    let snapshot = lobby.snapshot().await.expect("lobby closed");
    assert!(snapshot.waiting.is_empty());
    assert_eq!(snapshot.pairs.len(), 1);
    assert_eq!(signaling.total().await, 2);
}
