use duet_core::{ClientId, ServerEvent};

use crate::integration::{create_test_lobby, init_tracing, matched, next_delivery};

#[tokio::test]
async fn test_disconnect_removes_waiting_client() {
    init_tracing();

    let (lobby, mut delivered_rx, _signaling) = create_test_lobby();

    lobby.join(ClientId::from("a")).await.expect("lobby closed");
    lobby
        .disconnect(ClientId::from("a"))
        .await
        .expect("lobby closed");
    lobby.join(ClientId::from("b")).await.expect("lobby closed");
    lobby.join(ClientId::from("c")).await.expect("lobby closed");

    // a is gone, so b is the longest waiting client
    assert_eq!(next_delivery(&mut delivered_rx).await, matched("c", "b"));
    assert_eq!(next_delivery(&mut delivered_rx).await, matched("b", "c"));
}

#[tokio::test]
async fn test_disconnect_mid_session_frees_partner() {
    init_tracing();

    let (lobby, mut delivered_rx, _signaling) = create_test_lobby();
    let a1 = ClientId::from("a1");
    let b2 = ClientId::from("b2");

    lobby.join(a1.clone()).await.expect("lobby closed");
    lobby.join(b2.clone()).await.expect("lobby closed");
    next_delivery(&mut delivered_rx).await;
    next_delivery(&mut delivered_rx).await;

    lobby.disconnect(b2.clone()).await.expect("lobby closed");
    let left = next_delivery(&mut delivered_rx).await;
    assert_eq!(left.to, a1);
    assert_eq!(left.event, ServerEvent::UserLeft);

    // a1 may search again and pairs with a newcomer
    lobby.join(a1.clone()).await.expect("lobby closed");
    lobby.join(ClientId::from("c3")).await.expect("lobby closed");
    assert_eq!(next_delivery(&mut delivered_rx).await, matched("c3", "a1"));
}
