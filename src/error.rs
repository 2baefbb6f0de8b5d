use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration. Nothing is started when one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("host list is empty")]
    NoHosts,

    #[error("host entry {index} is blank")]
    BlankHost { index: usize },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Local failure that prevents a host from being probed at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("permission denied opening ICMP socket: {0}")]
    Permission(String),

    #[error("socket error: {0}")]
    Socket(String),
}
