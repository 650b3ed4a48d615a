//! Runtime-agnostic reconnect bookkeeping.
//!
//! Kept free of tokio so the retry math can be tested without a runtime.

use std::time::Duration;

use crate::config::ClientConfig;

/// Fixed-interval reconnect state: the same delay before every attempt, up to
/// a hard attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
}

impl FixedBackoff {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            interval,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.reconnect_interval, config.max_reconnect_attempts)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt, or `None`
    /// once the cap is reached.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_fixed() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(3000), 3);
        for expected_attempt in 1..=3 {
            assert_eq!(
                backoff.next_delay_and_advance(),
                Some(Duration::from_millis(3000))
            );
            assert_eq!(backoff.attempts(), expected_attempt);
        }
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay_and_advance(), None);
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(10), 1);
        assert!(backoff.next_delay_and_advance().is_some());
        assert!(backoff.is_exhausted());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(!backoff.is_exhausted());
    }

    #[test]
    fn test_from_config_uses_configured_policy() {
        let config = ClientConfig::default()
            .with_reconnect_interval(Duration::from_millis(250))
            .with_max_reconnect_attempts(2);
        let mut backoff = FixedBackoff::from_config(&config);
        assert_eq!(backoff.max_attempts(), 2);
        assert_eq!(
            backoff.next_delay_and_advance(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_zero_max_is_immediately_exhausted() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(10), 0);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay_and_advance(), None);
    }
}
