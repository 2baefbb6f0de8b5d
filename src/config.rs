use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rank::{SortDirection, SortKey, SortOrder};

pub const DEFAULT_HOSTS: [&str; 6] = [
    "1.1.1.1",
    "8.8.8.8",
    "github.com",
    "google.com",
    "amazon.com",
    "facebook.com",
];

const MIN_REFRESH: Duration = Duration::from_millis(200);
const MAX_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub hosts: Vec<String>,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub loss_window: usize,
    pub history_size: usize,
    /// Display refresh; derived from the interval when unset.
    pub refresh_ms: Option<u64>,
    pub sort: SortKey,
    pub descending: bool,
    pub beep: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
            interval_ms: 1000,
            timeout_ms: 1000,
            loss_window: 30,
            history_size: 40,
            refresh_ms: None,
            sort: SortKey::Name,
            descending: false,
            beep: false,
        }
    }
}

/// Validated, immutable run settings.
///
/// Sort order and beep flag are only the initial values; at runtime they
/// are changed through the monitor handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub hosts: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub loss_window: usize,
    pub history_size: usize,
    pub refresh: Duration,
    pub sort: SortOrder,
    pub beep: bool,
}

impl AppConfig {
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("PingBoard").join("config.json"))
    }

    /// Load the user config, falling back to defaults if it is missing or broken.
    pub fn load() -> Self {
        Self::get_config_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!("{e}; using defaults");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::get_config_path().ok_or("Could not find config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn sort_order(&self) -> SortOrder {
        let direction = if self.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        SortOrder::new(self.sort, direction)
    }

    /// Check every value and build the session the aggregator runs with.
    pub fn validate(&self) -> Result<Session, ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }

        let mut hosts: Vec<String> = Vec::with_capacity(self.hosts.len());
        for (index, host) in self.hosts.iter().enumerate() {
            let host = host.trim();
            if host.is_empty() {
                return Err(ConfigError::BlankHost { index });
            }
            if hosts.iter().any(|h| h == host) {
                log::debug!("ignoring duplicate host {host}");
                continue;
            }
            hosts.push(host.to_string());
        }

        let positive = |value: u64, field: &'static str| {
            if value == 0 {
                Err(ConfigError::NotPositive { field })
            } else {
                Ok(Duration::from_millis(value))
            }
        };
        let interval = positive(self.interval_ms, "interval")?;
        let timeout = positive(self.timeout_ms, "timeout")?;
        let refresh = match self.refresh_ms {
            Some(ms) => positive(ms, "refresh")?,
            None => interval.clamp(MIN_REFRESH, MAX_REFRESH),
        };

        if self.loss_window == 0 {
            return Err(ConfigError::NotPositive { field: "loss window" });
        }
        if self.history_size == 0 {
            return Err(ConfigError::NotPositive { field: "history size" });
        }

        if timeout > interval {
            log::warn!("timeout {timeout:?} exceeds interval {interval:?}; probes will run back to back");
        }
        if self.history_size < self.loss_window {
            log::warn!(
                "history size {} is smaller than loss window {}",
                self.history_size,
                self.loss_window
            );
        }

        Ok(Session {
            hosts,
            interval,
            timeout,
            loss_window: self.loss_window,
            history_size: self.history_size,
            refresh,
            sort: self.sort_order(),
            beep: self.beep,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let session = AppConfig::default().validate().unwrap();
        assert_eq!(session.hosts.len(), DEFAULT_HOSTS.len());
        assert_eq!(session.interval, Duration::from_secs(1));
        assert_eq!(session.timeout, Duration::from_secs(1));
        assert_eq!(session.loss_window, 30);
        assert_eq!(session.history_size, 40);
        assert_eq!(session.refresh, Duration::from_secs(1));
        assert_eq!(session.sort, SortOrder::ascending(SortKey::Name));
        assert!(!session.beep);
    }

    #[test]
    fn empty_host_list_is_rejected() {
        let config = AppConfig {
            hosts: Vec::new(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoHosts)));
    }

    #[test]
    fn blank_host_is_rejected() {
        let config = AppConfig {
            hosts: vec!["1.1.1.1".to_string(), "  ".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BlankHost { index: 1 })));
    }

    #[test]
    fn zero_values_are_rejected() {
        let cases = [
            (AppConfig { interval_ms: 0, ..AppConfig::default() }, "interval"),
            (AppConfig { timeout_ms: 0, ..AppConfig::default() }, "timeout"),
            (AppConfig { refresh_ms: Some(0), ..AppConfig::default() }, "refresh"),
            (AppConfig { loss_window: 0, ..AppConfig::default() }, "loss window"),
            (AppConfig { history_size: 0, ..AppConfig::default() }, "history size"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::NotPositive { field }) => assert_eq!(field, expected),
                other => panic!("expected NotPositive({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn timeout_above_interval_is_allowed() {
        let config = AppConfig {
            interval_ms: 500,
            timeout_ms: 2000,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_hosts_are_collapsed() {
        let config = AppConfig {
            hosts: vec!["a".to_string(), " a ".to_string(), "b".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.validate().unwrap().hosts, vec!["a", "b"]);
    }

    #[test]
    fn refresh_is_clamped_from_interval() {
        let fast = AppConfig { interval_ms: 50, ..AppConfig::default() };
        assert_eq!(fast.validate().unwrap().refresh, Duration::from_millis(200));

        let slow = AppConfig { interval_ms: 5000, ..AppConfig::default() };
        assert_eq!(slow.validate().unwrap().refresh, Duration::from_secs(1));

        let explicit = AppConfig { refresh_ms: Some(250), ..AppConfig::default() };
        assert_eq!(explicit.validate().unwrap().refresh, Duration::from_millis(250));
    }

    #[test]
    fn descending_flag_maps_to_sort_order() {
        let config = AppConfig {
            sort: SortKey::Loss,
            descending: true,
            ..AppConfig::default()
        };
        assert_eq!(config.sort_order(), SortOrder::descending(SortKey::Loss));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            hosts: vec!["example.com".to_string()],
            sort: SortKey::Rtt,
            beep: true,
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "hosts": ["9.9.9.9"], "sort": "jitter" }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.hosts, vec!["9.9.9.9"]);
        assert_eq!(config.sort, SortKey::Jitter);
        assert_eq!(config.interval_ms, 1000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Read { .. })));
    }
}
