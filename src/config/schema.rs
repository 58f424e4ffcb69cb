//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Deadlines for outbound calls.
    pub timeouts: TimeoutConfig,

    /// Outbound request settings.
    pub outbound: OutboundConfig,

    /// Endpoint paths and target parameter names.
    pub endpoints: EndpointConfig,

    /// Streaming download settings.
    pub download: DownloadConfig,

    /// WebSocket relay settings.
    pub relay: RelaySettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Fixed forwarding targets mounted under a path prefix.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for outbound operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a buffered forward (request + full response) in seconds.
    pub forward_secs: u64,

    /// Deadline for the download response head, and idle deadline between chunks.
    pub download_secs: u64,

    /// Deadline for opening the outbound WebSocket.
    pub relay_connect_secs: u64,
}

impl TimeoutConfig {
    pub fn forward(&self) -> Duration {
        Duration::from_secs(self.forward_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn relay_connect(&self) -> Duration {
        Duration::from_secs(self.relay_connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            forward_secs: 30,
            download_secs: 60,
            relay_connect_secs: 30,
        }
    }
}

/// Outbound request settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Verify upstream TLS certificates. Disabled by default.
    pub verify_tls: bool,

    /// Fixed `user-agent` sent upstream.
    pub user_agent: String,

    /// Extra inbound header passed upstream when present.
    pub custom_header: Option<String>,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            verify_tls: false,
            user_agent: concat!("relay-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            custom_header: Some("x-requested-with".to_string()),
        }
    }
}

/// Endpoint paths and the names callers use to pass a target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Buffered forwarding endpoint.
    pub forward_path: String,

    /// Streaming download endpoint.
    pub download_path: String,

    /// WebSocket relay endpoint.
    pub websocket_path: String,

    /// Query parameter carrying the target URL.
    pub target_param: String,

    /// Upgrade request header carrying the WebSocket target URL.
    pub target_header: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            forward_path: "/proxy".to_string(),
            download_path: "/download".to_string(),
            websocket_path: "/ws".to_string(),
            target_param: "url".to_string(),
            target_header: "x-target-url".to_string(),
        }
    }
}

/// Streaming download settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Declared sizes above this many bytes produce progress events.
    pub progress_threshold_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            progress_threshold_bytes: 1024 * 1024,
        }
    }
}

/// WebSocket relay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Messages buffered per direction before the reader waits on the writer.
    pub outbox_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self { outbox_capacity: 64 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// A fixed forwarding target mounted under a path prefix.
///
/// `GET /legacy/items?id=1` with prefix `/legacy` and target
/// `http://10.0.0.5:8080` forwards to `http://10.0.0.5:8080/items?id=1`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path prefix to mount, starting with `/`.
    pub path_prefix: String,

    /// Base URL requests are forwarded to.
    pub target: String,
}
