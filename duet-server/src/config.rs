use crate::error::ConfigError;
use axum::http::{HeaderValue, Method};
use std::env;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3001;

/// Origins allowed to open a signaling connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Comma separated list; empty or `*` means any origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/'))
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }

    /// Requests without an `Origin` header come from non-browser clients and
    /// are let through.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (_, None) => true,
            (Self::List(list), Some(origin)) => list.iter().any(|allowed| allowed == origin),
        }
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

        match self {
            Self::Any => layer.allow_origin(Any),
            Self::List(list) => {
                let values: Vec<HeaderValue> = list
                    .iter()
                    .filter_map(|origin| match HeaderValue::from_str(origin) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!("Ignoring malformed origin {:?}", origin);
                            None
                        }
                    })
                    .collect();
                layer.allow_origin(AllowOrigin::list(values))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: AllowedOrigins,
}

impl ServerConfig {
    /// Reads `PORT` and `ALLOWED_ORIGINS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            Err(_) => DEFAULT_PORT,
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|raw| AllowedOrigins::parse(&raw))
            .unwrap_or(AllowedOrigins::Any);

        Ok(Self {
            port,
            allowed_origins,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: AllowedOrigins::Any,
        }
    }
}
