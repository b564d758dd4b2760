//! Exponential backoff with jitter, shared by snapshot retries and stream
//! reconnects.

use std::time::Duration;

/// Configuration for retry and reconnection behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Maximum number of attempts after the first failure (0 = infinite)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Random jitter factor in `[0.0, 1.0]`, applied symmetrically
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Create a new backoff config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retries (0 = infinite)
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay in milliseconds
    #[must_use]
    pub fn initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    /// Set maximum delay in milliseconds
    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor, clamped to `[0.0, 1.0]`
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculate the un-jittered delay for a given retry attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let delay_ms = delay.min(self.max_delay_ms as f64).max(0.0) as u64;
        Duration::from_millis(delay_ms)
    }

    /// Delay for `attempt` with jitter applied, still capped at `max_delay_ms`
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter == 0.0 {
            return base;
        }

        let base_ms = base.as_millis() as f64;
        let range = base_ms * self.jitter;
        let offset = rand::random::<f64>() * 2.0 * range - range;
        let adjusted = (base_ms + offset).clamp(0.0, self.max_delay_ms as f64) as u64;
        Duration::from_millis(adjusted)
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_retries == 0 || attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_config_default() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_backoff_config_builder() {
        let config = BackoffConfig::new()
            .max_retries(5)
            .initial_delay_ms(50)
            .max_delay_ms(10_000)
            .backoff_multiplier(1.5)
            .jitter(3.0);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay_ms, 50);
        assert_eq!(config.max_delay_ms, 10_000);
        assert!((config.backoff_multiplier - 1.5).abs() < f64::EPSILON);
        assert!((config.jitter - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delay_calculation() {
        let config = BackoffConfig::new()
            .initial_delay_ms(100)
            .backoff_multiplier(2.0)
            .max_delay_ms(1000);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        // Capped at max_delay_ms
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = BackoffConfig::new()
            .initial_delay_ms(1000)
            .max_delay_ms(1500)
            .jitter(0.5);

        for _ in 0..100 {
            let delay = config.delay_with_jitter(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }

        let capped = config.delay_with_jitter(5);
        assert!(capped <= Duration::from_millis(1500));
    }

    #[test]
    fn test_should_retry() {
        let limited = BackoffConfig::new().max_retries(3);
        assert!(limited.should_retry(0));
        assert!(limited.should_retry(2));
        assert!(!limited.should_retry(3));

        let unlimited = BackoffConfig::new().max_retries(0);
        assert!(unlimited.should_retry(1_000));
    }
}
