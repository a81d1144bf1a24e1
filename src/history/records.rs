//! Audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RelayError;
use crate::upstream::UpstreamEndpoint;

/// Why an upstream was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    HealthCheckFailed,
    Manual,
    ApiError,
}

impl SwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchReason::HealthCheckFailed => "health_check_failed",
            SwitchReason::Manual => "manual",
            SwitchReason::ApiError => "api_error",
        }
    }
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchReason {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health_check_failed" => Ok(SwitchReason::HealthCheckFailed),
            "manual" => Ok(SwitchReason::Manual),
            "api_error" => Ok(SwitchReason::ApiError),
            other => Err(RelayError::Configuration(format!(
                "invalid switch reason '{}', expected health_check_failed, manual or api_error",
                other
            ))),
        }
    }
}

/// Immutable audit entry for one switch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    /// Assigned by the history store; 0 until appended.
    pub id: u64,
    pub local_port: u16,
    pub old_upstream: Option<UpstreamEndpoint>,
    pub new_upstream: UpstreamEndpoint,
    pub reason: SwitchReason,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl SwitchRecord {
    pub fn new(
        local_port: u16,
        old_upstream: Option<UpstreamEndpoint>,
        new_upstream: UpstreamEndpoint,
        reason: SwitchReason,
        success: bool,
    ) -> Self {
        Self {
            id: 0,
            local_port,
            old_upstream,
            new_upstream,
            reason,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Result of one monitor probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeLogEntry {
    pub local_port: u16,
    pub upstream: UpstreamEndpoint,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}
