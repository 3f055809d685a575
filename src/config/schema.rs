//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where RPC calls are sent.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body codec settings.
    pub codec: CodecConfig,

    /// Request routing settings.
    pub routing: RoutingConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How RPC methods are reached.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Over a network channel to `endpoint`.
    #[default]
    Remote,
    /// Directly against the in-process implementation.
    Local,
}

/// Upstream RPC service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub mode: UpstreamMode,

    /// RPC endpoint (e.g., "127.0.0.1:9090" or "http://host:9090").
    pub endpoint: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Transport level per-call timeout in seconds.
    pub request_timeout_secs: Option<u64>,

    /// TCP keepalive interval in seconds (0 disables).
    pub keepalive_secs: u64,

    /// Connect on first call instead of at startup.
    pub lazy_connect: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mode: UpstreamMode::Remote,
            endpoint: "127.0.0.1:9090".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: None,
            keepalive_secs: 60,
            lazy_connect: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout enforced at the HTTP layer, in seconds.
    pub request_secs: u64,

    /// Default RPC deadline when the client sends no `Grpc-Timeout`, in
    /// seconds (0 = none).
    pub rpc_secs: u64,

    /// Time allowed for in-flight requests to drain on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            rpc_secs: 0,
            shutdown_grace_secs: 10,
        }
    }
}

/// Body codec configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CodecConfig {
    /// Pretty print JSON responses.
    pub pretty: bool,

    /// Decode unknown content types as JSON instead of answering 415.
    pub accept_any_content_type: bool,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Honour `X-HTTP-Method-Override` on POST requests.
    pub method_override: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            method_override: true,
        }
    }
}

/// Request limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
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
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.upstream.mode, UpstreamMode::Remote);
        assert!(config.routing.method_override);
        assert_eq!(config.security.max_body_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_parse_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            mode = "local"
            endpoint = "http://echo:9090"
            lazy_connect = true

            [codec]
            pretty = true

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.mode, UpstreamMode::Local);
        assert_eq!(config.upstream.endpoint, "http://echo:9090");
        assert!(config.upstream.lazy_connect);
        assert_eq!(config.upstream.connect_timeout_secs, 5);
        assert!(config.codec.pretty);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
