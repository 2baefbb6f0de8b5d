//! Runs one monitor per host and streams ranked snapshots on a fixed tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{AppConfig, Session};
use crate::error::ConfigError;
use crate::monitor::{HostMonitor, HostSlot};
use crate::output::{Output, Record, Sink};
use crate::prober::Prober;
use crate::rank::{SortOrder, rank};
use crate::snapshot::HostSnapshot;

/// Ticks a writer output may fall behind before ticks are dropped for it.
const WRITER_BACKLOG: usize = 16;

/// Settings the presentation layer may change while monitoring runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub sort: SortOrder,
    pub beep: bool,
}

/// Read side of the per-host statistics.
///
/// Cloning is cheap; every clone sees the same hosts.
#[derive(Debug, Clone)]
pub struct Aggregator {
    slots: Arc<[Arc<HostSlot>]>,
}

impl Aggregator {
    pub fn builder(config: AppConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(config)
    }

    /// Snapshot every host, in configuration order.
    ///
    /// Each host is read under its own guard; a host in the middle of a probe
    /// contributes its last completed state.
    pub fn collect(&self) -> Vec<HostSnapshot> {
        self.slots.iter().map(|slot| slot.snapshot()).collect()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.host())
    }
}

/// Builder for starting an [`Aggregator`].
#[derive(Debug)]
pub struct AggregatorBuilder {
    config: AppConfig,
    outputs: Vec<Output>,
}

impl AggregatorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            outputs: Vec::new(),
        }
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; every tick is emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Validate the configuration, then spawn one monitor per host and the
    /// tick loop. Nothing is spawned if validation fails.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<P: Prober>(self, prober: P) -> Result<MonitorHandle, ConfigError> {
        let session = self.config.validate()?;
        Ok(spawn(session, Arc::new(prober), self.outputs))
    }
}

fn spawn<P: Prober>(session: Session, prober: Arc<P>, outputs: Vec<Output>) -> MonitorHandle {
    let slots: Arc<[Arc<HostSlot>]> = session
        .hosts
        .iter()
        .map(|host| Arc::new(HostSlot::new(host.as_str(), session.loss_window, session.history_size)))
        .collect();
    let aggregator = Aggregator { slots };

    let (stop_tx, _) = watch::channel(false);
    let monitors = aggregator
        .slots
        .iter()
        .map(|slot| {
            let monitor = HostMonitor::new(slot.clone(), prober.clone(), session.interval, session.timeout);
            tokio::spawn(monitor.run(stop_tx.subscribe()))
        })
        .collect();

    let (controls_tx, controls_rx) = watch::channel(Controls {
        sort: session.sort,
        beep: session.beep,
    });
    let (finish_tx, finish_rx) = oneshot::channel();
    let ticker = tokio::spawn(run_ticks(
        aggregator.clone(),
        outputs,
        controls_rx,
        session.refresh,
        finish_rx,
    ));

    log::info!(
        "started {} host monitors (interval {:?}, timeout {:?}, refresh {:?})",
        session.hosts.len(),
        session.interval,
        session.timeout,
        session.refresh
    );

    MonitorHandle {
        aggregator,
        controls: controls_tx,
        stop: stop_tx,
        finish: finish_tx,
        monitors,
        ticker,
    }
}

/// Emit one ranked record per host every `refresh`, plus a final tick once
/// `finish` fires (or its sender is dropped).
///
/// Outputs never hold up the loop: a writer that stops reading loses ticks
/// and gets `refresh` to drain on shutdown.
async fn run_ticks(
    aggregator: Aggregator,
    outputs: Vec<Output>,
    controls: watch::Receiver<Controls>,
    refresh: Duration,
    mut finish: oneshot::Receiver<()>,
) {
    let sinks: Vec<Sink> = outputs.into_iter().map(|output| output.start(WRITER_BACKLOG)).collect();
    let mut failing = vec![false; sinks.len()];
    let mut interval_timer = tokio::time::interval(refresh);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    loop {
        let last = tokio::select! {
            _ = interval_timer.tick() => false,
            _ = &mut finish => true,
        };

        tick += 1;
        let order = controls.borrow().sort;
        let records: Vec<Record> = rank(aggregator.collect(), order)
            .into_iter()
            .map(|snapshot| Record::new(tick, snapshot))
            .collect();

        for (sink, failing) in sinks.iter().zip(failing.iter_mut()) {
            match sink.send(&records) {
                Ok(()) if *failing => {
                    log::info!("{sink:?} recovered at tick {tick}");
                    *failing = false;
                }
                Ok(()) => {}
                Err(e) if !*failing => {
                    log::warn!("{sink:?} failed at tick {tick}: {e}; dropping records until it recovers");
                    *failing = true;
                }
                Err(_) => {}
            }
        }

        if last {
            break;
        }
    }

    for sink in sinks {
        sink.close(refresh).await;
    }
    log::info!("record stream closed after {tick} ticks");
}

/// Control handle returned by [`AggregatorBuilder::start`].
///
/// Dropping the handle stops every monitor and closes the record stream
/// without waiting; call [`MonitorHandle::stop`] for an orderly shutdown.
pub struct MonitorHandle {
    aggregator: Aggregator,
    controls: watch::Sender<Controls>,
    stop: watch::Sender<bool>,
    finish: oneshot::Sender<()>,
    monitors: Vec<JoinHandle<()>>,
    ticker: JoinHandle<()>,
}

impl MonitorHandle {
    /// Takes effect on the next tick; monitors keep running.
    pub fn change_sort(&self, order: SortOrder) {
        self.controls.send_modify(|controls| controls.sort = order);
    }

    pub fn sort_order(&self) -> SortOrder {
        self.controls.borrow().sort
    }

    pub fn set_beep(&self, on: bool) {
        self.controls.send_modify(|controls| controls.beep = on);
    }

    pub fn beep(&self) -> bool {
        self.controls.borrow().beep
    }

    pub fn subscribe_controls(&self) -> watch::Receiver<Controls> {
        self.controls.subscribe()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Current ranked snapshot of every host, outside the tick cadence.
    pub fn snapshot(&self) -> Vec<HostSnapshot> {
        rank(self.aggregator.collect(), self.sort_order())
    }

    /// Stop every monitor, wait for in-flight probes, emit a last tick and
    /// flush the outputs. Returns the final ranked snapshot.
    pub async fn stop(self) -> Vec<HostSnapshot> {
        let MonitorHandle {
            aggregator,
            controls,
            stop,
            finish,
            monitors,
            ticker,
        } = self;

        // No receivers left only means every monitor already ended.
        let _ = stop.send(true);
        for monitor in monitors {
            if let Err(e) = monitor.await {
                log::error!("host monitor task failed: {e}");
            }
        }

        let _ = finish.send(());
        if let Err(e) = ticker.await {
            log::error!("tick task failed: {e}");
        }

        log::info!("all host monitors stopped");
        let order = controls.borrow().sort;
        rank(aggregator.collect(), order)
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("hosts", &self.aggregator.slots.len())
            .field("controls", &*self.controls.borrow())
            .finish()
    }
}
