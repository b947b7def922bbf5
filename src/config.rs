use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_TIMED_WRITE_EXPIRY_MS, MRP_BACKOFF_BASE,
    MRP_BACKOFF_THRESHOLD, MRP_BASE_RETRY_INTERVAL_MS, MRP_MAX_TRANSMISSIONS,
};

/// Per-session tunables. Missing fields take the protocol defaults, so
/// `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline of a write when the caller doesn't give one
    pub response_timeout_ms: u64,
    /// Window requested by the `TimedRequest` ahead of a timed write
    pub timed_write_expiry_ms: u16,
    /// First retry delay after a failed send
    pub base_retry_interval_ms: u64,
    /// Attempts sent with the base interval before backoff kicks in
    pub backoff_threshold: u32,
    /// Total attempts for one frame, the first included
    pub max_transmissions: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            timed_write_expiry_ms: DEFAULT_TIMED_WRITE_EXPIRY_MS,
            base_retry_interval_ms: MRP_BASE_RETRY_INTERVAL_MS,
            backoff_threshold: MRP_BACKOFF_THRESHOLD,
            max_transmissions: MRP_MAX_TRANSMISSIONS,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn timed_write_expiry(&self) -> Duration {
        Duration::from_millis(self.timed_write_expiry_ms as u64)
    }

    /// Delay before retransmission `attempt`, counting from 1 for the first
    /// retry (4.12.2.1, without the random jitter).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let (numerator, denominator) = MRP_BACKOFF_BASE;
        let exponent = attempt.saturating_sub(self.backoff_threshold);
        let mut millis = self.base_retry_interval_ms;
        for _ in 0..exponent {
            millis = millis.saturating_mul(numerator) / denominator;
        }
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.response_timeout(), Duration::from_millis(5000));
        assert_eq!(config.timed_write_expiry(), Duration::from_millis(10000));
    }

    #[test]
    fn test_partial_override() {
        let config =
            SessionConfig::from_json(r#"{"response_timeout_ms": 250, "max_transmissions": 2}"#)
                .unwrap();
        assert_eq!(config.response_timeout_ms, 250);
        assert_eq!(config.max_transmissions, 2);
        assert_eq!(config.base_retry_interval_ms, MRP_BASE_RETRY_INTERVAL_MS);
        assert!(SessionConfig::from_json(r#"{"timed_write_expiry_ms": 70000}"#).is_err());
    }

    #[test]
    fn test_backoff() {
        let config = SessionConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(320));
        assert_eq!(config.backoff(3), Duration::from_millis(512));
    }
}
