//! Configuration schema definitions.
//!
//! This module defines the complete configuration document for the relay.
//! All types derive Serde traits for (de)serialization from the TOML file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::upstream::UpstreamEndpoint;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Health monitoring settings shared by all ports.
    pub monitoring: MonitoringConfig,

    /// Downstream proxy engine settings.
    pub engine: EngineConfig,

    /// Audit history persistence.
    pub history: HistoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Acquisition providers issuing replacement upstreams.
    pub providers: Vec<ProviderConfig>,

    /// Local listener ports and their routing.
    pub ports: Vec<PortBinding>,
}

impl RelayConfig {
    /// Look up the binding for a local port.
    pub fn binding(&self, local_port: u16) -> Option<&PortBinding> {
        self.ports.iter().find(|p| p.local_port == local_port)
    }

    pub fn binding_mut(&mut self, local_port: u16) -> Option<&mut PortBinding> {
        self.ports.iter_mut().find(|p| p.local_port == local_port)
    }

    /// Look up a provider by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}

/// Health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between probes of the same port.
    pub check_interval_secs: u64,

    /// Consecutive failed probes before a failover is triggered.
    pub failure_threshold: u32,

    /// Probe timeout in seconds.
    pub check_timeout_secs: u64,

    /// URL fetched through the upstream on every probe.
    pub check_url: String,
}

impl MonitoringConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            failure_threshold: 3,
            check_timeout_secs: 10,
            check_url: "http://www.google.com".to_string(),
        }
    }
}

/// Downstream proxy engine (sing-box) settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the rendered engine configuration.
    pub config_path: String,

    /// Address the per-port inbounds listen on.
    pub listen_address: String,

    /// Command (argv) that makes the engine pick up a new configuration.
    /// Empty disables reloading.
    pub reload_command: Vec<String>,

    /// Upper bound for the reload command in seconds.
    pub reload_timeout_secs: u64,

    /// Log level written into the rendered configuration.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_path: "/etc/sing-box/config.json".to_string(),
            listen_address: "0.0.0.0".to_string(),
            reload_command: vec![
                "systemctl".to_string(),
                "restart".to_string(),
                "sing-box".to_string(),
            ],
            reload_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

/// Audit history persistence.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// JSON snapshot file; history stays in memory only when unset.
    pub path: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
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
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// HTTP method used against an acquisition provider.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// An acquisition source for replacement upstreams.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProviderConfig {
    /// Unique provider identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider URL.
    pub endpoint: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Query parameters (GET).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON body template (POST).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Map<String, Value>>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Additional tries after the first failure.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base of the exponential backoff, in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    pub response_format: ResponseFormat,
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    2.0
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Response-schema descriptor, selected by the `type` field.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Numeric status code plus a list of proxies at `data_path`.
    #[serde(alias = "91http")]
    FixedCode(FixedCodeFormat),

    /// Boolean success flag plus a single proxy object at `data_path`.
    #[serde(alias = "custom")]
    Generic(GenericFormat),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FixedCodeFormat {
    /// Expected value of `code_field`; unchecked when unset.
    #[serde(default)]
    pub success_code: Option<i64>,

    #[serde(default = "default_code_field")]
    pub code_field: String,

    #[serde(default = "default_message_field")]
    pub message_field: String,

    /// Dotted path to the proxy list.
    pub data_path: String,

    #[serde(default = "default_ip_field")]
    pub ip_field: String,

    #[serde(default = "default_port_field")]
    pub port_field: String,

    #[serde(default = "default_fixed_username_field")]
    pub username_field: String,

    #[serde(default = "default_fixed_password_field")]
    pub password_field: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GenericFormat {
    /// Dotted path to the success flag; unchecked when unset.
    #[serde(default)]
    pub success_field: Option<String>,

    #[serde(default = "default_success_value")]
    pub success_value: Value,

    /// Dotted path to the proxy object; empty means the whole document.
    #[serde(default)]
    pub data_path: String,

    #[serde(default = "default_ip_field")]
    pub ip_field: String,

    #[serde(default = "default_port_field")]
    pub port_field: String,

    #[serde(default)]
    pub username_field: Option<String>,

    #[serde(default)]
    pub password_field: Option<String>,
}

fn default_code_field() -> String {
    "code".to_string()
}

fn default_message_field() -> String {
    "msg".to_string()
}

fn default_ip_field() -> String {
    "ip".to_string()
}

fn default_port_field() -> String {
    "port".to_string()
}

fn default_fixed_username_field() -> String {
    "http_user".to_string()
}

fn default_fixed_password_field() -> String {
    "http_pass".to_string()
}

fn default_success_value() -> Value {
    Value::Bool(true)
}

/// A local listener and its routing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PortBinding {
    /// Unique local listener port.
    pub local_port: u16,

    pub name: String,

    /// Provider used to acquire replacements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Whether this port is health-monitored.
    #[serde(default)]
    pub monitoring: bool,

    /// Optional inbound credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_password: Option<String>,

    /// Current upstream; direct mode when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamEndpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.monitoring.failure_threshold, 3);
        assert_eq!(config.monitoring.check_interval(), Duration::from_secs(30));
        assert!(config.ports.is_empty());
    }

    #[test]
    fn test_parse_full_document() {
        let config: RelayConfig = toml::from_str(
            r#"
            [monitoring]
            check_interval_secs = 15

            [[providers]]
            id = "pool"
            name = "Pool"
            endpoint = "http://api.example.com/get"
            params = { count = 1, region = "us" }

            [providers.response_format]
            type = "91http"
            success_code = 0
            data_path = "data.proxy_list"

            [[ports]]
            local_port = 1080
            name = "main"
            provider = "pool"
            monitoring = true

            [ports.upstream]
            protocol = "socks5"
            server = "1.2.3.4"
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.monitoring.check_interval_secs, 15);
        assert_eq!(config.monitoring.failure_threshold, 3);

        let provider = config.provider("pool").unwrap();
        assert!(provider.enabled);
        assert_eq!(provider.retry_attempts, 3);
        assert_eq!(provider.method, HttpMethod::Get);
        match &provider.response_format {
            ResponseFormat::FixedCode(f) => {
                assert_eq!(f.success_code, Some(0));
                assert_eq!(f.username_field, "http_user");
            }
            other => panic!("unexpected format {other:?}"),
        }

        let binding = config.binding(1080).unwrap();
        assert_eq!(binding.upstream, Some(UpstreamEndpoint::socks5("1.2.3.4", 9000)));
    }

    #[test]
    fn test_generic_format_defaults() {
        let format: ResponseFormat = toml::from_str(
            r#"
            type = "generic"
            success_field = "success"
            data_path = "data"
            "#,
        )
        .unwrap();
        match format {
            ResponseFormat::Generic(g) => {
                assert_eq!(g.success_value, Value::Bool(true));
                assert!(g.username_field.is_none());
            }
            other => panic!("unexpected format {other:?}"),
        }
    }
}
