// Retry strategy with exponential backoff and jitter
use std::time::Duration;

use rand::Rng;

use crate::error::CommonError;
use crate::sync::retry::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    MAX_BACKOFF_EXPONENT, MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS,
};
use crate::sync::retry::error::RetryResult;

/// Retry strategy with configurable exponential backoff and jitter
///
/// The strategy only computes delays and attempt limits; driving the
/// attempts is left to the caller so it can checkpoint work between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a custom retry strategy with validation
    ///
    /// # Errors
    /// Returns a configuration error when `max_attempts` is outside
    /// `1..=100` or `base_delay` exceeds `max_delay`.
    pub fn custom(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> RetryResult<Self> {
        validate_attempts(max_attempts)?;

        if base_delay > max_delay {
            return Err(CommonError::config(format!(
                "base_delay ({base_delay:?}) cannot be greater than max_delay ({max_delay:?})"
            ))
            .into());
        }

        Ok(Self { max_attempts, base_delay, max_delay, jitter_factor: DEFAULT_JITTER_FACTOR })
    }

    /// Set the maximum number of attempts with validation
    ///
    /// # Errors
    /// Returns a configuration error when `attempts` is outside `1..=100`.
    pub fn with_max_attempts(mut self, attempts: u32) -> RetryResult<Self> {
        validate_attempts(attempts)?;
        self.max_attempts = attempts;
        Ok(self)
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn without_jitter(self) -> Self {
        self.with_jitter_factor(0.0)
    }

    /// Delay before retry number `attempt` (zero-based), with jitter applied.
    pub fn get_delay(&self, attempt: u32) -> Duration {
        self.apply_jitter(self.calculate_exponential_delay(attempt))
    }

    /// `base * 2^attempt`, capped at `max_delay`.
    fn calculate_exponential_delay(&self, attempt: u32) -> Duration {
        let base_millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);

        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    /// Apply jitter to prevent thundering herd
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        // -jitter_range/2 to +jitter_range/2, never above the cap
        let jitter = rng.gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        let final_millis = (delay_millis + jitter).clamp(0.0, self.max_delay.as_millis() as f64);

        Duration::from_millis(final_millis as u64)
    }

    /// True while fewer than `max_attempts` attempts have been made.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

fn validate_attempts(attempts: u32) -> RetryResult<()> {
    if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&attempts) {
        return Err(CommonError::config_field(
            "max_attempts",
            format!("must be between {MIN_MAX_ATTEMPTS} and {MAX_MAX_ATTEMPTS}, got {attempts}"),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::retry::RetryError;

    fn strategy() -> RetryStrategy {
        RetryStrategy::custom(4, Duration::from_millis(100), Duration::from_millis(1000))
            .unwrap()
            .without_jitter()
    }

    #[test]
    fn delay_doubles_until_cap() {
        let s = strategy();
        assert_eq!(s.get_delay(0), Duration::from_millis(100));
        assert_eq!(s.get_delay(1), Duration::from_millis(200));
        assert_eq!(s.get_delay(3), Duration::from_millis(800));
        assert_eq!(s.get_delay(4), Duration::from_millis(1000));
        assert_eq!(s.get_delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_under_cap() {
        let s = strategy().with_jitter_factor(1.0);
        for attempt in 0..10 {
            assert!(s.get_delay(attempt) <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn attempts_are_bounded() {
        let s = strategy();
        assert!(s.should_retry(3));
        assert!(!s.should_retry(4));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            RetryStrategy::custom(0, Duration::ZERO, Duration::ZERO),
            Err(RetryError::Common(CommonError::Config { .. }))
        ));
        assert!(RetryStrategy::custom(3, Duration::from_secs(2), Duration::from_secs(1)).is_err());
        assert!(RetryStrategy::new().with_max_attempts(101).is_err());
    }
}
