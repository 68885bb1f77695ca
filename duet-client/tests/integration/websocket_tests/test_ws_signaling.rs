use duet_client::{ClientConfig, NegotiationState, Session, connect_signaling};
use duet_core::{MessageOrigin, Role};
use duet_server::{AllowedOrigins, AppState, router};
use std::net::SocketAddr;
use std::time::Duration;

use crate::integration::{init_tracing, wait_state, wait_until};
use crate::utils::{FakeMedia, FakeNetwork};

async fn spawn_server() -> SocketAddr {
    let app = router(AppState::new(AllowedOrigins::Any));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

#[tokio::test]
async fn test_sessions_connect_over_websocket() {
    init_tracing();

    let addr = spawn_server().await;
    let url = format!("ws://{addr}/ws");
    let network = FakeNetwork::new();

    let first = Session::spawn(
        ClientConfig::default(),
        connect_signaling(&url).await.expect("connect"),
        network.connector(),
        FakeMedia::granting(),
    );
    let second = Session::spawn(
        ClientConfig::default(),
        connect_signaling(&url).await.expect("connect"),
        network.connector(),
        FakeMedia::granting(),
    );

    let first_id = wait_until(&first, |s| s.client_id.is_some())
        .await
        .client_id
        .expect("welcome");
    let second_id = wait_until(&second, |s| s.client_id.is_some())
        .await
        .client_id
        .expect("welcome");
    assert_ne!(first_id, second_id);

    first.start_search().await.expect("session closed");
    wait_state(&first, NegotiationState::AwaitingMatch).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    second.start_search().await.expect("session closed");

    let a = wait_until(&first, |s| s.state == NegotiationState::Connected && s.chat_ready).await;
    let b = wait_until(&second, |s| s.state == NegotiationState::Connected && s.chat_ready).await;

    assert_eq!(a.partner_id, Some(second_id.clone()));
    assert_eq!(b.partner_id, Some(first_id.clone()));
    let expected = if first_id > second_id {
        Role::Caller
    } else {
        Role::Callee
    };
    assert_eq!(a.role, Some(expected));

    assert!(second.send_text("hello over ws").await.expect("session closed"));
    let a = wait_until(&first, |s| !s.messages.is_empty()).await;
    assert_eq!(a.messages[0].text, "hello over ws");
    assert_eq!(a.messages[0].sender, MessageOrigin::Peer);

    first.hang_up().await.expect("session closed");
    wait_state(&second, NegotiationState::Closed).await;
}
