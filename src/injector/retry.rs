//! Retry policy for script loads with linear backoff.
//!
//! A failed load is retried after `base_delay * attempt`, where `attempt` is
//! the number of loads already made. Aborted loads are never retried.

use crate::injector::LoadEvent;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total load attempts per override, first one included (default: 3)
    pub max_attempts: usize,
    /// Delay unit multiplied by the attempt number (default: 500ms)
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

/// Delay before the next load, after `attempt` loads have failed.
pub fn calculate_backoff(attempt: usize, config: &RetryConfig) -> Duration {
    config
        .base_delay
        .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
}

/// Whether another load may follow `attempt` loads ending in `event`.
pub fn should_retry(attempt: usize, event: &LoadEvent, config: &RetryConfig) -> bool {
    matches!(event, LoadEvent::Error(_)) && attempt < config.max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_linear() {
        let config = RetryConfig::default().base_delay(Duration::from_millis(100));

        assert_eq!(calculate_backoff(0, &config), Duration::ZERO);
        assert_eq!(calculate_backoff(1, &config), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, &config), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, &config), Duration::from_millis(300));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::default(); // max_attempts = 3
        let failed = LoadEvent::Error("404".into());

        assert!(should_retry(1, &failed, &config));
        assert!(should_retry(2, &failed, &config));
        assert!(!should_retry(3, &failed, &config));
        assert!(!should_retry(1, &LoadEvent::Abort, &config));
        assert!(!should_retry(1, &LoadEvent::Load, &config));
    }

    #[test]
    fn test_no_retry_config() {
        let config = RetryConfig::no_retry();
        assert!(!should_retry(1, &LoadEvent::Error("x".into()), &config));
        assert_eq!(RetryConfig::default().max_attempts(0).max_attempts, 1);
    }
}
