//! Server configuration.

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Configuration for the Prana gateway server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket channels; upgrades beyond this are refused.
    pub max_connections: usize,
    /// Seconds between liveness probes. A channel that misses one full probe
    /// cycle without a pong is terminated on the next probe.
    pub probe_interval_secs: u64,
    /// Per-channel outbound queue depth.
    pub channel_buffer: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 200,
            probe_interval_secs: 30,
            channel_buffer: 256,
            max_message_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `PRANA_*` environment variables layered over
    /// the defaults (e.g. `PRANA_PORT=8080`, `PRANA_HOST=0.0.0.0`).
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("PRANA_"))
            .extract()
    }
}
