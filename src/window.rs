//! Rolling per-host statistics.

use chrono::{DateTime, Utc};

use crate::ping::Outcome;
use crate::ring::Ring;
use crate::snapshot::HostSnapshot;

/// Rolling history of one host's probe outcomes.
///
/// Two independent rings are kept: the loss window (lost or not, last `W`
/// outcomes) and the latency history (RTT or gap, last `H` outcomes).
/// Failures count toward loss but never contribute a latency value.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    losses: Ring<bool>,
    history: Ring<Option<f64>>,
    latest: Option<Outcome>,
    last_rtt: Option<f64>,
    probes: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl StatsWindow {
    pub fn new(loss_window: usize, history_size: usize) -> Self {
        Self {
            losses: Ring::new(loss_window),
            history: Ring::new(history_size),
            latest: None,
            last_rtt: None,
            probes: 0,
            updated_at: None,
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.record_at(outcome, Utc::now());
    }

    pub fn record_at(&mut self, outcome: Outcome, at: DateTime<Utc>) {
        self.losses.push(!outcome.is_success());
        let rtt = outcome.rtt_ms();
        self.history.push(rtt);
        if rtt.is_some() {
            self.last_rtt = rtt;
        }
        self.latest = Some(outcome);
        self.probes += 1;
        self.updated_at = Some(at);
    }

    /// Mean absolute difference between adjacent successful samples,
    /// newest first.
    ///
    /// `None` without any successful sample; `0` when there is a successful
    /// sample but no adjacent successful pair.
    pub fn jitter(&self) -> Option<f64> {
        if !self.history.iter_newest_first().any(|s| s.is_some()) {
            return None;
        }

        let (sum, pairs) = self
            .history
            .iter_newest_first()
            .zip(self.history.iter_newest_first().skip(1))
            .filter_map(|pair| match pair {
                (Some(newer), Some(older)) => Some((newer - older).abs()),
                _ => None,
            })
            .fold((0.0, 0usize), |(sum, pairs), delta| (sum + delta, pairs + 1));

        if pairs == 0 {
            Some(0.0)
        } else {
            Some(sum / pairs as f64)
        }
    }

    /// Share of failed outcomes in the loss window; 0 before the first probe.
    pub fn loss_percent(&self) -> f64 {
        if self.losses.is_empty() {
            return 0.0;
        }
        let lost = self.losses.iter_newest_first().filter(|lost| *lost).count();
        100.0 * lost as f64 / self.losses.len() as f64
    }

    pub fn average(&self) -> Option<f64> {
        let (sum, count) = self
            .history
            .iter_newest_first()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), rtt| (sum + rtt, count + 1));

        (count > 0).then(|| sum / count as f64)
    }

    pub fn latest(&self) -> Option<&Outcome> {
        self.latest.as_ref()
    }

    /// RTT of the most recent successful probe, kept across later failures.
    pub fn last_rtt(&self) -> Option<f64> {
        self.last_rtt
    }

    pub fn probes(&self) -> u64 {
        self.probes
    }

    pub fn loss_window_len(&self) -> usize {
        self.losses.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> Vec<Option<f64>> {
        self.history.iter_newest_first().collect()
    }

    pub fn snapshot(&self, host: &str, fault: Option<&str>) -> HostSnapshot {
        HostSnapshot {
            host: host.to_string(),
            rtt_ms: self.last_rtt,
            jitter_ms: self.jitter(),
            loss_pct: self.loss_percent(),
            avg_ms: self.average(),
            status: self.latest.as_ref().map(Outcome::status),
            probes: self.probes,
            history: self.history(),
            updated_at: self.updated_at,
            fault: fault.map(str::to_string),
        }
    }
}
