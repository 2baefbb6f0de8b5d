use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use pingboard::{
    Aggregator, AppConfig, Controls, HostSnapshot, IcmpProber, Output, Record, SortKey, Status,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

#[derive(Parser, Debug)]
#[command(name = "pingboard", version)]
#[command(about = "Ping several hosts and stream RTT, jitter and loss as JSON lines")]
struct Args {
    /// Read settings from this file instead of the user config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hosts to ping
    #[arg(long, num_args = 1..)]
    hosts: Option<Vec<String>>,

    /// Probe interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-probe timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of recent probes used for loss percentage
    #[arg(long)]
    loss_window: Option<usize>,

    /// Number of recent probes kept for average and jitter
    #[arg(long)]
    hist_size: Option<usize>,

    /// Output refresh in milliseconds
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// Sort rows by this field
    #[arg(long, value_enum)]
    sort: Option<SortKey>,

    /// Sort descending
    #[arg(long)]
    descending: bool,

    /// Ring the terminal bell on every successful reply
    #[arg(long)]
    beep: bool,

    /// Write the final statistics of every host to this file on exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Persist the effective settings as the user config
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(hosts) = &self.hosts {
            config.hosts = hosts.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.interval_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        if let Some(size) = self.loss_window {
            config.loss_window = size;
        }
        if let Some(size) = self.hist_size {
            config.history_size = size;
        }
        if let Some(ms) = self.refresh_ms {
            config.refresh_ms = Some(ms);
        }
        if let Some(key) = self.sort {
            config.sort = key;
        }
        config.descending |= self.descending;
        config.beep |= self.beep;
    }
}

#[derive(Serialize)]
struct Export<'a> {
    generated_at: DateTime<Utc>,
    hosts: &'a [HostSnapshot],
}

fn export(path: &Path, hosts: &[HostSnapshot]) -> Result<(), Box<dyn std::error::Error>> {
    let report = Export {
        generated_at: Utc::now(),
        hosts,
    };
    let content = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// BEL on stderr once per new successful reply while beeping is enabled.
async fn beep_on_reply(mut records: mpsc::Receiver<Record>, controls: watch::Receiver<Controls>) {
    let mut seen: HashMap<String, u64> = HashMap::new();

    while let Some(record) = records.recv().await {
        let snapshot = record.snapshot;
        let previous = seen.insert(snapshot.host, snapshot.probes).unwrap_or(0);
        let fresh_reply = snapshot.probes > previous && snapshot.status == Some(Status::Reply);

        if fresh_reply && controls.borrow().beep {
            let mut stderr = std::io::stderr();
            if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
                log::debug!("could not ring the bell: {e}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    args.apply(&mut config);

    if args.save_config {
        config.save()?;
    }

    let (beeps, records) = Output::channel(1024);
    let handle = Aggregator::builder(config)
        .output(Output::stdout())
        .output(beeps)
        .start(IcmpProber::new())?;
    let beeper = tokio::spawn(beep_on_reply(records, handle.subscribe_controls()));

    let run_for = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        _ = run_for => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    let last = handle.stop().await;
    beeper.await?;

    if let Some(path) = &args.export {
        export(path, &last)?;
        log::info!("exported {} hosts to {}", last.len(), path.display());
    }

    Ok(())
}
