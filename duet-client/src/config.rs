use duet_core::IceServerConfig;
use duet_core::utils::DEFAULT_STUN_ADDR;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a session may stay in `Negotiating` before it fails.
    pub negotiation_timeout: Duration,
    /// Search again automatically when the partner leaves or the link drops.
    pub auto_rejoin: bool,
    /// Sent with `join_waiting_pool`; the server does not interpret it.
    pub preferences: Option<Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
            negotiation_timeout: Duration::from_secs(30),
            auto_rejoin: false,
            preferences: None,
        }
    }
}
