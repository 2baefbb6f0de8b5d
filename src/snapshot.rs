use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ping::Status;

/// Derived statistics of one host at one instant.
///
/// Absent values (no reply yet, no reply at all) are `None` and are
/// serialized as `null`, never as `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub host: String,
    /// RTT of the most recent successful probe; absent until the first reply.
    /// `status` tells whether the newest probe failed since.
    pub rtt_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub loss_pct: f64,
    pub avg_ms: Option<f64>,
    pub status: Option<Status>,
    /// Outcomes recorded since the host started.
    pub probes: u64,
    /// Newest first, `None` for failed probes.
    pub history: Vec<Option<f64>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set once the host hit a fatal error; the other fields stay frozen.
    pub fault: Option<String>,
}

impl HostSnapshot {
    /// Snapshot of a host that has not completed any probe.
    pub fn empty(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            rtt_ms: None,
            jitter_ms: None,
            loss_pct: 0.0,
            avg_ms: None,
            status: None,
            probes: 0,
            history: Vec::new(),
            updated_at: None,
            fault: None,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }
}
