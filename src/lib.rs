//! # pingboard
//!
//! Probes a set of hosts concurrently and keeps rolling RTT, jitter, loss and
//! average statistics per host, streamed as ranked JSON lines.
//!
//! ```rust,no_run
//! use pingboard::{Aggregator, AppConfig, IcmpProber, Output};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig {
//!         hosts: vec!["1.1.1.1".into(), "example.com".into()],
//!         ..AppConfig::default()
//!     };
//!
//!     let (output, mut records) = Output::channel(256);
//!     let handle = Aggregator::builder(config)
//!         .output(output)
//!         .start(IcmpProber::new())?;
//!
//!     while let Some(record) = records.recv().await {
//!         println!("{} {:?}", record.snapshot.host, record.snapshot.rtt_ms);
//!         if record.tick >= 10 {
//!             break;
//!         }
//!     }
//!
//!     let last = handle.stop().await;
//!     println!("{} hosts", last.len());
//!     Ok(())
//! }
//! ```

mod aggregator;
mod config;
mod error;
mod monitor;
mod output;
mod ping;
mod prober;
mod rank;
mod ring;
mod snapshot;
mod window;

pub use aggregator::{Aggregator, AggregatorBuilder, Controls, MonitorHandle};
pub use config::{AppConfig, DEFAULT_HOSTS, Session};
pub use error::{ConfigError, ProbeError};
pub use monitor::{HostMonitor, HostSlot};
pub use output::{Output, Record, SCHEMA_VERSION};
pub use ping::{Outcome, Status};
pub use prober::{IcmpProber, Prober, Target, resolve_host};
pub use rank::{SortDirection, SortKey, SortOrder, rank};
pub use ring::Ring;
pub use snapshot::HostSnapshot;
pub use window::StatsWindow;
