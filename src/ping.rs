use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(Duration),
    Timeout,
    Unreachable,
    Error(ProbeError),
}

/// Wire tag of an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Reply,
    Timeout,
    Unreachable,
    Error,
}

impl Outcome {
    pub fn reply_ms(response_time_ms: f64) -> Self {
        Outcome::Reply(Duration::from_secs_f64(response_time_ms.max(0.0) / 1000.0))
    }

    pub fn rtt_ms(&self) -> Option<f64> {
        match self {
            Outcome::Reply(rtt) => Some(rtt.as_secs_f64() * 1000.0),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Reply(_))
    }

    /// Host-fatal outcomes stop the host's monitor for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn status(&self) -> Status {
        match self {
            Outcome::Reply(_) => Status::Reply,
            Outcome::Timeout => Status::Timeout,
            Outcome::Unreachable => Status::Unreachable,
            Outcome::Error(_) => Status::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_carries_rtt_in_millis() {
        let outcome = Outcome::reply_ms(12.5);
        assert!(outcome.is_success());
        assert!((outcome.rtt_ms().unwrap() - 12.5).abs() < 1e-6);
        assert_eq!(outcome.status(), Status::Reply);
    }

    #[test]
    fn negative_rtt_is_clamped_to_zero() {
        assert_eq!(Outcome::reply_ms(-3.0), Outcome::Reply(Duration::ZERO));
    }

    #[test]
    fn failures_have_no_rtt() {
        for outcome in [
            Outcome::Timeout,
            Outcome::Unreachable,
            Outcome::Error(ProbeError::Socket("boom".to_string())),
        ] {
            assert!(!outcome.is_success());
            assert_eq!(outcome.rtt_ms(), None);
        }
    }

    #[test]
    fn only_local_errors_are_fatal() {
        assert!(!Outcome::Timeout.is_fatal());
        assert!(!Outcome::Unreachable.is_fatal());
        assert!(Outcome::Error(ProbeError::Permission("denied".to_string())).is_fatal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Unreachable).unwrap();
        assert_eq!(json, "\"unreachable\"");
    }
}
