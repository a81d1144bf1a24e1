//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (ports reference existing providers)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect duplicate ports and provider ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before a config is accepted into the system or written to disk

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{RelayConfig, ResponseFormat};

/// Lowest local port a binding may listen on.
pub const MIN_LOCAL_PORT: u16 = 1024;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate local_port {0}")]
    DuplicatePort(u16),

    #[error("local_port {0} must be between 1024 and 65535")]
    PortOutOfRange(u16),

    #[error("duplicate provider id '{0}'")]
    DuplicateProvider(String),

    #[error("port {port} references unknown provider '{provider}'")]
    UnknownProvider { port: u16, provider: String },

    #[error("port {0} enables monitoring without an upstream")]
    MonitoringWithoutUpstream(u16),

    #[error("port {0} has an upstream with port 0")]
    InvalidUpstreamPort(u16),

    #[error("{field} must not be empty")]
    Empty { field: String },

    #[error("{field} must be positive")]
    NotPositive { field: String },
}

/// Validate a full configuration document.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let monitoring = &config.monitoring;
    if monitoring.check_interval_secs == 0 {
        errors.push(not_positive("monitoring.check_interval_secs"));
    }
    if monitoring.failure_threshold == 0 {
        errors.push(not_positive("monitoring.failure_threshold"));
    }
    if monitoring.check_timeout_secs == 0 {
        errors.push(not_positive("monitoring.check_timeout_secs"));
    }
    if monitoring.check_url.is_empty() {
        errors.push(empty("monitoring.check_url"));
    }

    let mut provider_ids = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        if provider.id.is_empty() {
            errors.push(empty(&format!("providers[{}].id", i)));
        } else if !provider_ids.insert(provider.id.as_str()) {
            errors.push(ValidationError::DuplicateProvider(provider.id.clone()));
        }
        if provider.name.is_empty() {
            errors.push(empty(&format!("providers[{}].name", i)));
        }
        if provider.endpoint.is_empty() {
            errors.push(empty(&format!("providers[{}].endpoint", i)));
        }
        if provider.timeout_secs == 0 {
            errors.push(not_positive(&format!("providers[{}].timeout_secs", i)));
        }
        if !(provider.backoff_base > 0.0) {
            errors.push(not_positive(&format!("providers[{}].backoff_base", i)));
        }
        if let ResponseFormat::FixedCode(format) = &provider.response_format {
            if format.data_path.is_empty() {
                errors.push(empty(&format!("providers[{}].response_format.data_path", i)));
            }
        }
    }

    let mut ports = HashSet::new();
    for (i, binding) in config.ports.iter().enumerate() {
        if binding.local_port < MIN_LOCAL_PORT {
            errors.push(ValidationError::PortOutOfRange(binding.local_port));
        }
        if !ports.insert(binding.local_port) {
            errors.push(ValidationError::DuplicatePort(binding.local_port));
        }
        if binding.name.is_empty() {
            errors.push(empty(&format!("ports[{}].name", i)));
        }
        if let Some(provider) = &binding.provider {
            if !provider_ids.contains(provider.as_str()) {
                errors.push(ValidationError::UnknownProvider {
                    port: binding.local_port,
                    provider: provider.clone(),
                });
            }
        }
        match &binding.upstream {
            Some(upstream) if upstream.port() == 0 => {
                errors.push(ValidationError::InvalidUpstreamPort(binding.local_port));
            }
            None if binding.monitoring => {
                errors.push(ValidationError::MonitoringWithoutUpstream(binding.local_port));
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn empty(field: &str) -> ValidationError {
    ValidationError::Empty { field: field.to_string() }
}

fn not_positive(field: &str) -> ValidationError {
    ValidationError::NotPositive { field: field.to_string() }
}
