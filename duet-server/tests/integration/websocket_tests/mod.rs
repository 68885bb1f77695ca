mod test_ws_session_flow;

use std::net::SocketAddr;

use duet_server::{AllowedOrigins, AppState, router};

/// Serves the signaling router on an ephemeral local port.
pub async fn spawn_server(allowed_origins: AllowedOrigins) -> SocketAddr {
    let state = AppState::new(allowed_origins);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}
