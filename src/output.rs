//! Output sinks for the per-tick record stream.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::snapshot::HostSnapshot;

/// Version of the record layout. Field names and `null` absence markers
/// are part of the contract.
pub const SCHEMA_VERSION: u32 = 1;

/// One host's statistics at one aggregator tick.
///
/// Serialized as a single JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub version: u32,
    /// Aggregator tick; strictly increasing, shared by all hosts of a tick.
    pub tick: u64,
    #[serde(flatten)]
    pub snapshot: HostSnapshot,
}

impl Record {
    pub fn new(tick: u64, snapshot: HostSnapshot) -> Self {
        Self {
            version: SCHEMA_VERSION,
            tick,
            snapshot,
        }
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}

/// Destination for records.
pub enum Output {
    /// Newline-delimited JSON to any async writer (stdout, file, socket).
    Writer(Box<dyn AsyncWrite + Send + Unpin>),

    /// Records pushed through a bounded channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<Record>),
}

impl Output {
    pub fn writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Output::Writer(Box::new(writer))
    }

    pub fn stdout() -> Self {
        Self::writer(tokio::io::stdout())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// Records are dropped when the channel is full; the producer never
    /// waits on a slow consumer.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Record>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Output::Channel(tx), rx)
    }

    /// Start the output for the tick loop.
    ///
    /// A writer gets its own task behind a queue of `backlog` ticks, so a
    /// consumer that stops reading only loses its own records.
    pub(crate) fn start(self, backlog: usize) -> Sink {
        match self {
            Output::Writer(writer) => {
                let (tx, rx) = mpsc::channel(backlog.max(1));
                let task = tokio::spawn(write_ticks(writer, rx));
                Sink::Writer { tx, task }
            }
            Output::Channel(tx) => Sink::Channel(tx),
        }
    }
}

/// An [`Output`] attached to a running tick loop.
pub(crate) enum Sink {
    Writer {
        tx: mpsc::Sender<Vec<Record>>,
        task: JoinHandle<()>,
    },
    Channel(mpsc::Sender<Record>),
}

impl Sink {
    /// Hand one tick's records over without waiting on the consumer.
    ///
    /// A full queue drops the tick and reports `WouldBlock`; a gone
    /// consumer reports `BrokenPipe`.
    pub(crate) fn send(&self, records: &[Record]) -> io::Result<()> {
        match self {
            Sink::Writer { tx, .. } => match tx.try_send(records.to_vec()) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "writer is not keeping up, tick dropped",
                )),
                Err(TrySendError::Closed(_)) => Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "writer task ended",
                )),
            },
            Sink::Channel(tx) => {
                for record in records {
                    match tx.try_send(record.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            log::debug!("record channel full, dropping tick {}", record.tick);
                        }
                        Err(TrySendError::Closed(_)) => {
                            return Err(io::Error::new(
                                io::ErrorKind::BrokenPipe,
                                "record receiver dropped",
                            ));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Let a writer drain its queue and flush, giving up after `grace`.
    pub(crate) async fn close(self, grace: Duration) {
        let Sink::Writer { tx, mut task } = self else {
            return;
        };
        drop(tx);

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("output writer task failed: {e}"),
            Err(_) => {
                log::warn!("output writer still blocked after {grace:?}, abandoning queued records");
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sink::Writer { .. } => f.write_str("Output::Writer"),
            Sink::Channel(tx) => f.debug_tuple("Output::Channel").field(tx).finish(),
        }
    }
}

async fn write_lines(writer: &mut (dyn AsyncWrite + Send + Unpin), records: &[Record]) -> io::Result<()> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Write queued ticks until the tick loop hangs up, then flush.
async fn write_ticks(mut writer: Box<dyn AsyncWrite + Send + Unpin>, mut ticks: mpsc::Receiver<Vec<Record>>) {
    let mut failing = false;

    while let Some(records) = ticks.recv().await {
        match write_lines(writer.as_mut(), &records).await {
            Ok(()) if failing => {
                log::info!("output writer recovered");
                failing = false;
            }
            Ok(()) => {}
            Err(e) if !failing => {
                log::warn!("output writer failed: {e}; dropping records until it recovers");
                failing = true;
            }
            Err(_) => {}
        }
    }

    if let Err(e) = writer.flush().await {
        log::warn!("output writer failed to flush: {e}");
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Writer(_) => f.write_str("Output::Writer"),
            Output::Channel(tx) => f.debug_tuple("Output::Channel").field(tx).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::Outcome;
    use crate::window::StatsWindow;

    fn sample_snapshot() -> HostSnapshot {
        let mut window = StatsWindow::new(5, 5);
        for outcome in [
            Outcome::reply_ms(10.0),
            Outcome::reply_ms(12.5),
            Outcome::Timeout,
            Outcome::reply_ms(11.0),
        ] {
            window.record(outcome);
        }
        window.snapshot("1.1.1.1", None)
    }

    #[test]
    fn record_round_trips_through_a_line() {
        let record = Record::new(7, sample_snapshot());
        let line = record.to_line().unwrap();
        assert!(!line.contains('\n'));

        let parsed = Record::from_line(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn absent_values_are_explicit_nulls() {
        let record = Record::new(1, HostSnapshot::empty("silent"));
        let value: serde_json::Value = serde_json::from_str(&record.to_line().unwrap()).unwrap();

        for field in ["rtt_ms", "jitter_ms", "avg_ms", "status", "updated_at", "fault"] {
            assert!(value.get(field).is_some(), "missing field {field}");
            assert!(value[field].is_null(), "{field} should be null");
        }
        assert_eq!(value["version"], 1);
        assert_eq!(value["tick"], 1);
        assert_eq!(value["host"], "silent");
        assert_eq!(value["loss_pct"], 0.0);
    }

    #[test]
    fn failed_samples_are_null_in_history() {
        let record = Record::new(3, sample_snapshot());
        let value: serde_json::Value = serde_json::from_str(&record.to_line().unwrap()).unwrap();
        let history = value["history"].as_array().unwrap();
        assert_eq!(history.len(), 4);
        assert!(history[1].is_null());
        assert_eq!(value["status"], "reply");
    }

    #[tokio::test]
    async fn writer_output_emits_one_line_per_record() {
        let (client, mut server) = tokio::io::duplex(4096);
        let sink = Output::writer(client).start(4);

        let records = vec![
            Record::new(1, sample_snapshot()),
            Record::new(1, HostSnapshot::empty("8.8.8.8")),
        ];
        sink.send(&records).unwrap();
        sink.close(Duration::from_secs(1)).await;

        let mut text = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut text)
            .await
            .unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(Record::from_line(lines[1]).unwrap().snapshot.host, "8.8.8.8");
    }

    #[tokio::test(start_paused = true)]
    async fn unread_writer_drops_ticks_instead_of_blocking() {
        let (client, _server) = tokio::io::duplex(64);
        let sink = Output::writer(client).start(2);
        let records = vec![Record::new(1, sample_snapshot())];

        let mut dropped = 0;
        for _ in 0..10 {
            if let Err(e) = sink.send(&records) {
                assert_eq!(e.kind(), io::ErrorKind::WouldBlock);
                dropped += 1;
            }
            tokio::task::yield_now().await;
        }
        assert!(dropped > 0);

        let started = tokio::time::Instant::now();
        sink.close(Duration::from_millis(500)).await;
        assert!(started.elapsed() <= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn channel_output_drops_when_full() {
        let (output, mut rx) = Output::channel(1);
        let sink = output.start(4);
        let records = vec![
            Record::new(1, HostSnapshot::empty("a")),
            Record::new(1, HostSnapshot::empty("b")),
        ];
        sink.send(&records).unwrap();

        assert_eq!(rx.recv().await.unwrap().snapshot.host, "a");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn channel_output_reports_closed_receiver() {
        let (output, rx) = Output::channel(4);
        drop(rx);
        let err = output
            .start(4)
            .send(&[Record::new(1, HostSnapshot::empty("a"))])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
