use crate::config::AllowedOrigins;
use crate::lobby::{Lobby, LobbyHandle};
use crate::signaling::{SignalingService, ws_handler};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub signaling: SignalingService,
    pub lobby: LobbyHandle,
    pub allowed_origins: AllowedOrigins,
}

impl AppState {
    /// Spawns the lobby event loop; must be called inside a Tokio runtime.
    pub fn new(allowed_origins: AllowedOrigins) -> Arc<Self> {
        let signaling = SignalingService::new();
        let lobby = Lobby::spawn(Arc::new(signaling.clone()));

        Arc::new(Self {
            signaling,
            lobby,
            allowed_origins,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(state.allowed_origins.cors_layer())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.lobby.snapshot().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "connections": state.signaling.connection_count(),
                "waiting": snapshot.waiting.len(),
                "pairs": snapshot.pairs.len(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": e.to_string() })),
        ),
    }
}
