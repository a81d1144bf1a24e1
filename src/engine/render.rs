//! sing-box configuration rendering.

use serde_json::{json, Map, Value};

use crate::config::schema::{PortBinding, RelayConfig};
use crate::upstream::{ProxyServer, UpstreamEndpoint, VlessServer, VlessTransport};

pub fn inbound_tag(local_port: u16) -> String {
    format!("socks-{}", local_port)
}

pub fn outbound_tag(local_port: u16) -> String {
    format!("upstream-{}", local_port)
}

/// Render the complete engine document for every binding.
pub fn render_engine_config(config: &RelayConfig) -> Value {
    let mut inbounds = Vec::with_capacity(config.ports.len());
    let mut outbounds = Vec::with_capacity(config.ports.len());
    let mut rules = Vec::with_capacity(config.ports.len());

    for binding in &config.ports {
        inbounds.push(render_inbound(binding, &config.engine.listen_address));
        outbounds.push(render_outbound(binding));
        rules.push(json!({
            "inbound": [inbound_tag(binding.local_port)],
            "outbound": outbound_tag(binding.local_port),
        }));
    }

    tracing::debug!(
        inbounds = inbounds.len(),
        outbounds = outbounds.len(),
        "Rendered engine configuration"
    );

    json!({
        "log": {
            "level": config.engine.log_level,
            "timestamp": true,
        },
        "inbounds": inbounds,
        "outbounds": outbounds,
        "route": {
            "rules": rules,
        },
    })
}

fn render_inbound(binding: &PortBinding, listen: &str) -> Value {
    let mut inbound = json!({
        "type": "socks",
        "tag": inbound_tag(binding.local_port),
        "listen": listen,
        "listen_port": binding.local_port,
    });
    if let (Some(username), Some(password)) = (&binding.local_username, &binding.local_password) {
        inbound["users"] = json!([{ "username": username, "password": password }]);
    }
    inbound
}

fn render_outbound(binding: &PortBinding) -> Value {
    let tag = outbound_tag(binding.local_port);
    match &binding.upstream {
        None => json!({ "type": "direct", "tag": tag }),
        Some(UpstreamEndpoint::Socks5(proxy)) => proxy_outbound("socks", tag, proxy, false),
        Some(UpstreamEndpoint::Http(proxy)) => proxy_outbound("http", tag, proxy, false),
        Some(UpstreamEndpoint::Https(proxy)) => proxy_outbound("http", tag, proxy, true),
        Some(UpstreamEndpoint::Vless(vless)) => vless_outbound(tag, vless),
    }
}

fn proxy_outbound(kind: &str, tag: String, proxy: &ProxyServer, tls: bool) -> Value {
    let mut outbound = json!({
        "type": kind,
        "tag": tag,
        "server": proxy.server,
        "server_port": proxy.port,
    });
    if let Some((username, password)) = proxy.credentials() {
        outbound["username"] = json!(username);
        outbound["password"] = json!(password);
    }
    if kind == "socks" {
        outbound["version"] = json!("5");
    }
    if tls {
        outbound["tls"] = json!({ "enabled": true, "server_name": proxy.server });
    }
    outbound
}

fn vless_outbound(tag: String, vless: &VlessServer) -> Value {
    let mut outbound = json!({
        "type": "vless",
        "tag": tag,
        "server": vless.server,
        "server_port": vless.port,
        "uuid": vless.uuid.to_string(),
    });
    if let Some(flow) = &vless.flow {
        outbound["flow"] = json!(flow);
    }

    if let Some(tls) = &vless.tls {
        let mut section = Map::new();
        section.insert("enabled".into(), json!(true));
        section.insert(
            "server_name".into(),
            json!(tls.server_name.as_deref().unwrap_or(&vless.server)),
        );
        if !tls.alpn.is_empty() {
            section.insert("alpn".into(), json!(tls.alpn));
        }
        outbound["tls"] = Value::Object(section);
    }

    match &vless.transport {
        Some(VlessTransport::Ws { path, host }) => {
            let mut transport = json!({ "type": "ws" });
            if let Some(path) = path {
                transport["path"] = json!(path);
            }
            if let Some(host) = host {
                transport["headers"] = json!({ "Host": host });
            }
            outbound["transport"] = transport;
        }
        Some(VlessTransport::Grpc { service_name }) => {
            let mut transport = json!({ "type": "grpc" });
            if let Some(name) = service_name {
                transport["service_name"] = json!(name);
            }
            outbound["transport"] = transport;
        }
        None => {}
    }

    outbound
}
