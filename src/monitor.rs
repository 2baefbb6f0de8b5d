//! Per-host probe loop and the guarded state it shares with the aggregator.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ProbeError;
use crate::ping::Outcome;
use crate::prober::{Prober, Target};
use crate::snapshot::HostSnapshot;
use crate::window::StatsWindow;

#[derive(Debug)]
struct SlotState {
    window: StatsWindow,
    fault: Option<String>,
}

/// Statistics of one host, written by its monitor and read by the aggregator.
///
/// The lock is only held to push one outcome or to copy the buffers out, so
/// readers never wait on an in-flight probe.
#[derive(Debug)]
pub struct HostSlot {
    host: String,
    state: Mutex<SlotState>,
}

impl HostSlot {
    pub fn new(host: impl Into<String>, loss_window: usize, history_size: usize) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(SlotState {
                window: StatsWindow::new(loss_window, history_size),
                fault: None,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn record(&self, outcome: Outcome) {
        self.state.lock().window.record(outcome);
    }

    pub fn set_fault(&self, fault: &ProbeError) {
        self.state.lock().fault = Some(fault.to_string());
    }

    pub fn is_faulted(&self) -> bool {
        self.state.lock().fault.is_some()
    }

    /// Copy the window out under the lock, derive statistics outside it.
    pub fn snapshot(&self) -> HostSnapshot {
        let (window, fault) = {
            let state = self.state.lock();
            (state.window.clone(), state.fault.clone())
        };
        window.snapshot(&self.host, fault.as_deref())
    }
}

/// Drives one host: probe, record, sleep until the next cycle, repeat.
pub struct HostMonitor<P> {
    slot: Arc<HostSlot>,
    prober: Arc<P>,
    interval: Duration,
    timeout: Duration,
}

impl<P: Prober> HostMonitor<P> {
    pub fn new(slot: Arc<HostSlot>, prober: Arc<P>, interval: Duration, timeout: Duration) -> Self {
        Self {
            slot,
            prober,
            interval,
            timeout,
        }
    }

    /// Run until `stop` turns true (or its sender is dropped) or the host
    /// hits a fatal error.
    ///
    /// Cycles start `interval` apart, measured from cycle start. A probe that
    /// overruns the interval is followed immediately by the next one. The
    /// stop signal is only observed between probes, so an in-flight probe
    /// always completes.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let host = self.slot.host().to_string();

        let resolved = tokio::select! {
            resolved = self.prober.resolve(&host) => resolved,
            _ = stop.changed() => return,
        };
        let target = match resolved {
            Ok(addr) => Target::new(host.as_str(), addr),
            Err(e) => return self.fail(e),
        };
        log::info!("monitoring {} ({})", target.host, target.addr);

        let mut seq: u16 = 0;
        loop {
            if *stop.borrow() {
                break;
            }

            let started = Instant::now();
            let outcome = self.prober.probe(&target, seq, self.timeout).await;
            log::debug!("{host} seq {seq}: {outcome:?}");
            seq = seq.wrapping_add(1);

            let fatal = match &outcome {
                Outcome::Error(e) => Some(e.clone()),
                _ => None,
            };
            self.slot.record(outcome);
            if let Some(e) = fatal {
                return self.fail(e);
            }

            tokio::select! {
                _ = tokio::time::sleep_until(started + self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::info!("stopped monitoring {host}");
    }

    fn fail(&self, e: ProbeError) {
        log::error!("{}: {e}; host will no longer be probed", self.slot.host());
        self.slot.set_fault(&e);
    }
}
