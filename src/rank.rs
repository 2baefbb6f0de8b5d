//! Ordering of host snapshots for display and streaming.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::snapshot::HostSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Rtt,
    Loss,
    Jitter,
    Avg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Ascending)
    }

    pub fn descending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Descending)
    }
}

/// Absent metrics rank as the worst (highest) value in either direction.
fn compare_metric(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::INFINITY)
        .total_cmp(&b.unwrap_or(f64::INFINITY))
}

fn compare(a: &HostSnapshot, b: &HostSnapshot, order: SortOrder) -> Ordering {
    let primary = match order.key {
        SortKey::Name => a.host.to_lowercase().cmp(&b.host.to_lowercase()),
        SortKey::Rtt => compare_metric(a.rtt_ms, b.rtt_ms),
        SortKey::Loss => a.loss_pct.total_cmp(&b.loss_pct),
        SortKey::Jitter => compare_metric(a.jitter_ms, b.jitter_ms),
        SortKey::Avg => compare_metric(a.avg_ms, b.avg_ms),
    };

    let primary = match order.direction {
        SortDirection::Ascending => primary,
        SortDirection::Descending => primary.reverse(),
    };

    // Name ascending regardless of direction, so equal rows never swap.
    primary.then_with(|| a.host.cmp(&b.host))
}

/// Sort snapshots into a total order for the given key and direction.
pub fn rank(mut snapshots: Vec<HostSnapshot>, order: SortOrder) -> Vec<HostSnapshot> {
    snapshots.sort_by(|a, b| compare(a, b, order));
    snapshots
}
