//! Per-port monitor state.
//!
//! # States
//! - Stopped: no loop; `enabled = false`
//! - Running: loop probing every `check_interval`
//!
//! # State Transitions
//! ```text
//! Stopped → Running: start(port)
//! Running → Stopped: stop(port)
//! ```
//!
//! `failure_count` resets after any healthy probe and after every switch
//! attempt, successful or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::upstream::UpstreamEndpoint;

/// Live health status of one monitored port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub local_port: u16,
    pub enabled: bool,
    pub failure_count: u32,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub current_upstream: Option<UpstreamEndpoint>,
}

impl MonitorState {
    /// Fresh state for a monitor that is about to start.
    pub fn started(local_port: u16, current_upstream: Option<UpstreamEndpoint>) -> Self {
        Self {
            local_port,
            enabled: true,
            failure_count: 0,
            last_check_time: None,
            last_success_time: None,
            current_upstream,
        }
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_check_time = Some(at);
        self.last_success_time = Some(at);
        self.failure_count = 0;
    }

    /// Count a failed probe; returns the new consecutive failure count.
    pub fn record_failure(&mut self, at: DateTime<Utc>) -> u32 {
        self.last_check_time = Some(at);
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count
    }
}
