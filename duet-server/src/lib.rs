mod app;
mod config;
mod error;
mod lobby;
mod signaling;

pub use app::{AppState, router};
pub use config::{AllowedOrigins, ServerConfig};
pub use error::{ConfigError, LobbyError};
pub use lobby::*;
pub use signaling::*;
