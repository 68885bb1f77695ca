use duet_core::{ClientEvent, ServerEvent};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use super::spawn_server;
use crate::integration::init_tracing;
use crate::utils::WsTestClient;
use duet_server::AllowedOrigins;

#[tokio::test]
async fn test_ws_match_signal_and_hangup() {
    init_tracing();

    let addr = spawn_server(AllowedOrigins::Any).await;

    let mut first = WsTestClient::connect(addr).await.expect("connect first");
    let mut second = WsTestClient::connect(addr).await.expect("connect second");
    assert_ne!(first.client_id, second.client_id);

    let join = ClientEvent::JoinWaitingPool { preferences: None };
    first.send(&join).await.expect("send join");
    // Until first's join is applied second could take the head of the pool.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    second.send(&join).await.expect("send join");

    assert_eq!(
        second.recv().await.expect("matched"),
        ServerEvent::Matched {
            partner_id: first.client_id.clone()
        }
    );
    assert_eq!(
        first.recv().await.expect("matched"),
        ServerEvent::Matched {
            partner_id: second.client_id.clone()
        }
    );

    let offer = json!({ "offer": { "type": "offer", "sdp": "v=0" } });
    second
        .send(&ClientEvent::Signal {
            partner_id: first.client_id.clone(),
            signal_data: offer.clone(),
        })
        .await
        .expect("send signal");
    assert_eq!(
        first.recv().await.expect("signal"),
        ServerEvent::Signal { signal_data: offer }
    );

    first
        .send(&ClientEvent::Hangup {
            partner_id: Some(second.client_id.clone()),
        })
        .await
        .expect("send hangup");
    assert_eq!(second.recv().await.expect("user_left"), ServerEvent::UserLeft);

    first.close().await.expect("close");
    second.close().await.expect("close");
}

#[tokio::test]
async fn test_ws_disconnect_notifies_partner() {
    init_tracing();

    let addr = spawn_server(AllowedOrigins::Any).await;

    let mut first = WsTestClient::connect(addr).await.expect("connect first");
    let mut second = WsTestClient::connect(addr).await.expect("connect second");

    let join = ClientEvent::JoinWaitingPool { preferences: None };
    first.send(&join).await.expect("send join");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    second.send(&join).await.expect("send join");
    second.recv().await.expect("matched");
    first.recv().await.expect("matched");

    // Garbage frames are ignored and the connection survives.
    first.send_raw("{not json").await.expect("send garbage");

    first.close().await.expect("close");
    assert_eq!(second.recv().await.expect("user_left"), ServerEvent::UserLeft);
}

#[tokio::test]
async fn test_ws_rejects_unlisted_origin() {
    init_tracing();

    let addr = spawn_server(AllowedOrigins::parse("https://duet.example")).await;

    let mut request = format!("ws://{addr}/ws")
        .into_client_request()
        .expect("request");
    request
        .headers_mut()
        .insert("Origin", "https://evil.example".parse().expect("header"));
    assert!(connect_async(request).await.is_err());

    let mut request = format!("ws://{addr}/ws")
        .into_client_request()
        .expect("request");
    request
        .headers_mut()
        .insert("Origin", "https://duet.example".parse().expect("header"));
    assert!(connect_async(request).await.is_ok());
}

#[tokio::test]
async fn test_ws_bare_join_frames_are_matched() {
    init_tracing();

    let addr = spawn_server(AllowedOrigins::Any).await;

    let mut first = WsTestClient::connect(addr).await.expect("connect first");
    let mut second = WsTestClient::connect(addr).await.expect("connect second");

    first
        .send_raw(r#"{"op":"join_waiting_pool"}"#)
        .await
        .expect("send join");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    second
        .send_raw(r#"{"op":"join_waiting_pool","d":null}"#)
        .await
        .expect("send join");

    assert_eq!(
        first.recv().await.expect("matched"),
        ServerEvent::Matched {
            partner_id: second.client_id.clone()
        }
    );
    assert_eq!(
        second.recv().await.expect("matched"),
        ServerEvent::Matched {
            partner_id: first.client_id.clone()
        }
    );

    second
        .send_raw(r#"{"op":"hangup"}"#)
        .await
        .expect("send hangup");
    assert_eq!(first.recv().await.expect("user_left"), ServerEvent::UserLeft);
}
