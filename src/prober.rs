use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};

use crate::error::ProbeError;
use crate::ping::Outcome;

/// A host resolved to a probe-able address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub addr: IpAddr,
    /// ICMP identifier used for every probe of this host.
    pub ident: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            host: host.into(),
            addr,
            ident: rand::random(),
        }
    }
}

/// One latency measurement primitive.
///
/// `probe` must issue exactly one probe and return within `timeout` plus a
/// small overhead; retries are left to the caller's schedule.
pub trait Prober: Send + Sync + 'static {
    fn resolve(&self, host: &str) -> impl Future<Output = Result<IpAddr, ProbeError>> + Send {
        resolve_host(host)
    }

    fn probe(
        &self,
        target: &Target,
        seq: u16,
        timeout: Duration,
    ) -> impl Future<Output = Outcome> + Send;
}

/// Sanitize hostname by keeping only valid characters (alphanumeric, dots, hyphens)
/// Returns None if the result is empty
fn sanitize_hostname(hostname: &str) -> Option<String> {
    // Also handle case where user included port like "example.com:8080"
    let hostname = hostname.split(':').next().unwrap_or(hostname);

    let sanitized: String = hostname
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-')
        .collect();

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Resolve a host name (or IP literal) to its first address.
pub async fn resolve_host(host: &str) -> Result<IpAddr, ProbeError> {
    // Try parsing as IP address first
    if let Ok(ip) = host.trim().parse::<IpAddr>() {
        return Ok(ip);
    }

    let resolve_error = |reason: String| ProbeError::Resolve {
        host: host.to_string(),
        reason,
    };

    let sanitized = sanitize_hostname(host.trim())
        .ok_or_else(|| resolve_error("not a valid host name".to_string()))?;

    let mut addrs = tokio::net::lookup_host(format!("{sanitized}:80"))
        .await
        .map_err(|e| resolve_error(e.to_string()))?;

    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| resolve_error("no addresses found".to_string()))
}

fn local_error(e: io::Error) -> ProbeError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        ProbeError::Permission(e.to_string())
    } else {
        ProbeError::Socket(e.to_string())
    }
}

/// ICMP echo prober backed by `surge-ping`.
///
/// One client per address family is opened up front and shared by every
/// host. If a family's socket cannot be opened, every probe of that family
/// reports the error instead of measuring.
pub struct IcmpProber {
    v4: Result<Client, ProbeError>,
    v6: Result<Client, ProbeError>,
}

impl IcmpProber {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let v4 = Client::new(&Config::default()).map_err(local_error);
        let v6 = Client::new(&Config::builder().kind(ICMP::V6).build()).map_err(local_error);

        if let Err(e) = &v4 {
            log::warn!("IPv4 ICMP socket unavailable: {e}");
        }
        if let Err(e) = &v6 {
            log::debug!("IPv6 ICMP socket unavailable: {e}");
        }

        Self { v4, v6 }
    }

    fn client_for(&self, addr: IpAddr) -> &Result<Client, ProbeError> {
        match addr {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        }
    }
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for IcmpProber {
    async fn probe(&self, target: &Target, seq: u16, timeout: Duration) -> Outcome {
        let client = match self.client_for(target.addr) {
            Ok(client) => client,
            Err(e) => return Outcome::Error(e.clone()),
        };

        let mut pinger = client.pinger(target.addr, PingIdentifier(target.ident)).await;
        pinger.timeout(timeout);

        match tokio::time::timeout(timeout, pinger.ping(PingSequence(seq), &[])).await {
            Ok(Ok((_, rtt))) => Outcome::Reply(rtt),
            Ok(Err(SurgeError::Timeout { .. })) | Err(_) => Outcome::Timeout,
            Ok(Err(SurgeError::IOError(e))) if e.kind() == io::ErrorKind::PermissionDenied => {
                Outcome::Error(local_error(e))
            }
            Ok(Err(e)) => {
                log::debug!("{} ({}) seq {seq}: {e}", target.host, target.addr);
                Outcome::Unreachable
            }
        }
    }
}
