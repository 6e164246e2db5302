//! Connection settings for the storage services.

use std::time::Duration;

/// Default service root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// A single attempt, never retried.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt number (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64) as u64;
        // Fixed padding of an eighth of the delay; no randomness.
        let padding = (capped_delay / 4).max(1) / 2;
        capped_delay.saturating_add(padding)
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:5000/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for idempotent reads.
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 10_000);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig::new(10, 100, 1_000, 2.0);
        assert_eq!(config.delay_for_attempt(0), 112);
        assert_eq!(config.delay_for_attempt(1), 225);
        assert_eq!(config.delay_for_attempt(2), 450);
        assert_eq!(config.delay_for_attempt(8), 1_125);
    }

    #[test]
    fn test_delay_is_deterministic() {
        let config = RetryConfig::default();
        for attempt in 0..6 {
            assert_eq!(
                config.delay_for_attempt(attempt),
                config.delay_for_attempt(attempt)
            );
        }
        assert_eq!(RetryConfig::new(3, 1, 5, 2.0).delay_for_attempt(0), 1);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://example.test/api")
            .with_token("secret")
            .with_retry(RetryConfig::none())
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.base_url, "http://example.test/api");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
