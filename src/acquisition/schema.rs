//! Provider response schemas.
//!
//! # Responsibilities
//! - Decide whether a provider response reports success
//! - Locate the proxy record at the configured path
//! - Map configurable field names onto an `UpstreamEndpoint`
//!
//! # Design Decisions
//! - One strategy per schema kind, selected by `response_format.type`
//! - Records without a `protocol` field are SOCKS5
//! - VLESS records must carry a valid `uuid`

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::acquisition::path::extract_path;
use crate::acquisition::AcquisitionError;
use crate::config::schema::{FixedCodeFormat, GenericFormat, ResponseFormat};
use crate::upstream::{ProxyServer, UpstreamEndpoint, VlessServer, VlessTls, VlessTransport};

/// Turns a decoded provider response into an upstream endpoint.
pub trait ResponseSchema: Send + Sync {
    fn extract(&self, response: &Value) -> Result<UpstreamEndpoint, AcquisitionError>;
}

impl ResponseFormat {
    /// Strategy for this descriptor.
    pub fn schema(&self) -> &dyn ResponseSchema {
        match self {
            ResponseFormat::FixedCode(format) => format,
            ResponseFormat::Generic(format) => format,
        }
    }
}

impl ResponseSchema for FixedCodeFormat {
    fn extract(&self, response: &Value) -> Result<UpstreamEndpoint, AcquisitionError> {
        if let Some(expected) = self.success_code {
            let code = response.get(&self.code_field).and_then(Value::as_i64);
            if code != Some(expected) {
                let message = response
                    .get(&self.message_field)
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error");
                return Err(AcquisitionError::Provider(format!(
                    "provider returned code {}: {}",
                    code.map_or_else(|| "none".to_string(), |c| c.to_string()),
                    message
                )));
            }
        }

        let list = extract_path(response, &self.data_path)?
            .as_array()
            .ok_or_else(|| AcquisitionError::Parse(format!("expected a list at '{}'", self.data_path)))?;
        let first = list
            .first()
            .ok_or_else(|| AcquisitionError::Provider("no proxy found in response".to_string()))?;
        let record = as_record(first)?;

        endpoint_from_record(
            record,
            &FieldNames {
                ip: &self.ip_field,
                port: &self.port_field,
                username: Some(&self.username_field),
                password: Some(&self.password_field),
            },
        )
    }
}

impl ResponseSchema for GenericFormat {
    fn extract(&self, response: &Value) -> Result<UpstreamEndpoint, AcquisitionError> {
        if let Some(field) = &self.success_field {
            let flag = extract_path(response, field)?;
            if *flag != self.success_value {
                return Err(AcquisitionError::Provider(format!(
                    "provider reported failure: {} = {}",
                    field, flag
                )));
            }
        }

        let record = as_record(extract_path(response, &self.data_path)?)?;
        endpoint_from_record(
            record,
            &FieldNames {
                ip: &self.ip_field,
                port: &self.port_field,
                username: self.username_field.as_deref(),
                password: self.password_field.as_deref(),
            },
        )
    }
}

struct FieldNames<'a> {
    ip: &'a str,
    port: &'a str,
    username: Option<&'a str>,
    password: Option<&'a str>,
}

fn as_record(value: &Value) -> Result<&Map<String, Value>, AcquisitionError> {
    value
        .as_object()
        .ok_or_else(|| AcquisitionError::Parse(format!("expected a proxy object, got {}", value)))
}

fn string_field(record: &Map<String, Value>, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn port_field(record: &Map<String, Value>, field: &str) -> Result<u16, AcquisitionError> {
    let value = record
        .get(field)
        .ok_or_else(|| AcquisitionError::Parse(format!("missing required field '{}'", field)))?;
    let port = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    port.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| AcquisitionError::Parse(format!("invalid port value {}", value)))
}

fn endpoint_from_record(
    record: &Map<String, Value>,
    fields: &FieldNames<'_>,
) -> Result<UpstreamEndpoint, AcquisitionError> {
    let server = string_field(record, fields.ip)
        .ok_or_else(|| AcquisitionError::Parse(format!("missing required field '{}'", fields.ip)))?;
    let port = port_field(record, fields.port)?;

    let protocol = record.get("protocol").and_then(Value::as_str).unwrap_or("socks5");
    if protocol == "vless" {
        return vless_from_record(record, server, port).map(UpstreamEndpoint::Vless);
    }

    let mut proxy = ProxyServer::new(server, port);
    proxy.username = fields.username.and_then(|f| string_field(record, f));
    proxy.password = fields.password.and_then(|f| string_field(record, f));

    match protocol {
        "socks5" => Ok(UpstreamEndpoint::Socks5(proxy)),
        "http" => Ok(UpstreamEndpoint::Http(proxy)),
        "https" => Ok(UpstreamEndpoint::Https(proxy)),
        other => Err(AcquisitionError::Parse(format!("unsupported protocol '{}'", other))),
    }
}

fn vless_from_record(
    record: &Map<String, Value>,
    server: String,
    port: u16,
) -> Result<VlessServer, AcquisitionError> {
    let uuid = string_field(record, "uuid")
        .ok_or_else(|| AcquisitionError::Parse("UUID is required for VLESS protocol".to_string()))?;
    let uuid = Uuid::parse_str(&uuid)
        .map_err(|e| AcquisitionError::Parse(format!("invalid VLESS uuid '{}': {}", uuid, e)))?;

    let mut vless = VlessServer::new(server, port, uuid);
    vless.flow = string_field(record, "flow");
    if let Some(encryption) = string_field(record, "encryption") {
        vless.encryption = encryption;
    }

    if record.get("tls").and_then(Value::as_bool).unwrap_or(false) {
        let alpn = match record.get("alpn") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect(),
            _ => Vec::new(),
        };
        vless.tls = Some(VlessTls {
            server_name: string_field(record, "sni"),
            alpn,
        });
    }

    vless.transport = match record.get("network").and_then(Value::as_str).unwrap_or("tcp") {
        "tcp" => None,
        "ws" => Some(VlessTransport::Ws {
            path: string_field(record, "ws_path"),
            host: string_field(record, "ws_host"),
        }),
        "grpc" => Some(VlessTransport::Grpc {
            service_name: string_field(record, "grpc_service_name"),
        }),
        other => return Err(AcquisitionError::Parse(format!("unsupported VLESS network '{}'", other))),
    };

    Ok(vless)
}
