//! Upstream endpoint model.
//!
//! # Responsibilities
//! - Represent a single remote proxy target
//! - Build the proxy dial URL used by health probes
//! - Provide a log-friendly description without leaking credentials

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// A remote proxy target that local traffic is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum UpstreamEndpoint {
    Socks5(ProxyServer),
    Http(ProxyServer),
    Https(ProxyServer),
    Vless(VlessServer),
}

/// Address and optional credentials of a SOCKS5 or HTTP(S) proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyServer {
    pub server: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyServer {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Credentials are only used when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

/// A VLESS server. `uuid` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessServer {
    pub server: String,
    pub port: u16,
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default = "default_encryption")]
    pub encryption: String,
    /// Present when the connection is wrapped in TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<VlessTls>,
    /// Absent means plain TCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<VlessTransport>,
}

fn default_encryption() -> String {
    "none".to_string()
}

impl VlessServer {
    pub fn new(server: impl Into<String>, port: u16, uuid: Uuid) -> Self {
        Self {
            server: server.into(),
            port,
            uuid,
            flow: None,
            encryption: default_encryption(),
            tls: None,
            transport: None,
        }
    }
}

/// TLS settings for a VLESS connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
}

/// Non-TCP transports for VLESS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VlessTransport {
    Ws {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host: Option<String>,
    },
    Grpc {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
    },
}

impl UpstreamEndpoint {
    pub fn socks5(server: impl Into<String>, port: u16) -> Self {
        Self::Socks5(ProxyServer::new(server, port))
    }

    pub fn http(server: impl Into<String>, port: u16) -> Self {
        Self::Http(ProxyServer::new(server, port))
    }

    /// Protocol name as written in config files.
    pub fn protocol(&self) -> &'static str {
        match self {
            Self::Socks5(_) => "socks5",
            Self::Http(_) => "http",
            Self::Https(_) => "https",
            Self::Vless(_) => "vless",
        }
    }

    pub fn server(&self) -> &str {
        match self {
            Self::Socks5(p) | Self::Http(p) | Self::Https(p) => &p.server,
            Self::Vless(v) => &v.server,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Socks5(p) | Self::Http(p) | Self::Https(p) => p.port,
            Self::Vless(v) => v.port,
        }
    }

    /// VLESS cannot be dialed as a plain HTTP proxy.
    pub fn is_probeable(&self) -> bool {
        !matches!(self, Self::Vless(_))
    }

    /// Proxy URL suitable for an HTTP client, or `None` for VLESS.
    ///
    /// SOCKS5 uses the `socks5h` scheme so DNS is resolved by the proxy
    /// rather than locally.
    pub fn proxy_url(&self) -> Result<Option<Url>, url::ParseError> {
        let (scheme, proxy) = match self {
            Self::Socks5(p) => ("socks5h", p),
            Self::Http(p) => ("http", p),
            Self::Https(p) => ("https", p),
            Self::Vless(_) => return Ok(None),
        };

        let host = if proxy.server.contains(':') && !proxy.server.starts_with('[') {
            format!("[{}]", proxy.server)
        } else {
            proxy.server.clone()
        };
        let mut url = Url::parse(&format!("{}://{}:{}", scheme, host, proxy.port))?;

        if let Some((user, pass)) = proxy.credentials() {
            // Host-based URLs always accept userinfo.
            let _ = url.set_username(user);
            let _ = url.set_password(Some(pass));
        }
        Ok(Some(url))
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol(), self.server(), self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_url_resolves_through_proxy() {
        let endpoint = UpstreamEndpoint::Socks5(
            ProxyServer::new("10.0.0.1", 1080).with_credentials("user", "p@ss"),
        );
        let url = endpoint.proxy_url().unwrap().unwrap();
        assert_eq!(url.scheme(), "socks5h");
        assert_eq!(url.username(), "user");
        assert_eq!(url.password(), Some("p%40ss"));
        assert_eq!(url.port(), Some(1080));
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        let mut server = ProxyServer::new("proxy.local", 8080);
        server.username = Some("only-user".into());
        let url = UpstreamEndpoint::Http(server).proxy_url().unwrap().unwrap();
        assert_eq!(url.as_str(), "http://proxy.local:8080/");
    }

    #[test]
    fn test_vless_has_no_proxy_url() {
        let endpoint = UpstreamEndpoint::Vless(VlessServer::new("vless.example", 443, Uuid::nil()));
        assert!(endpoint.proxy_url().unwrap().is_none());
        assert!(!endpoint.is_probeable());
    }

    #[test]
    fn test_deserialize_tagged_endpoint() {
        let endpoint: UpstreamEndpoint = toml::from_str(
            r#"
            protocol = "vless"
            server = "edge.example.com"
            port = 443
            uuid = "b831381d-6324-4d53-ad4f-8cda48b30811"

            [tls]
            server_name = "edge.example.com"

            [transport]
            type = "ws"
            path = "/ray"
            "#,
        )
        .unwrap();

        match &endpoint {
            UpstreamEndpoint::Vless(v) => {
                assert_eq!(v.transport, Some(VlessTransport::Ws { path: Some("/ray".into()), host: None }));
                assert_eq!(v.encryption, "none");
                assert_eq!(v.tls.as_ref().unwrap().server_name.as_deref(), Some("edge.example.com"));
            }
            other => panic!("expected vless, got {other:?}"),
        }
        assert_eq!(endpoint.to_string(), "vless://edge.example.com:443");
    }

    #[test]
    fn test_vless_without_uuid_is_rejected() {
        let result: Result<UpstreamEndpoint, _> = toml::from_str(
            r#"
            protocol = "vless"
            server = "edge.example.com"
            port = 443
            "#,
        );
        assert!(result.is_err());
    }
}
