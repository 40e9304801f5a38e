//! Retry classification and submit backoff

use std::time::Duration;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network blip, throttling, server-side hiccup
    Transient,
    /// Validation failure, not-found, conflict; retrying cannot help
    Permanent,
}

impl ErrorClass {
    pub fn of<E, R>(error: &E, is_retryable: R) -> Self
    where
        E: ?Sized,
        R: Fn(&E) -> bool,
    {
        if is_retryable(error) {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        }
    }
}

/// Errors that know their own retry class
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    fn class(&self) -> ErrorClass {
        ErrorClass::of(self, Self::is_retryable)
    }
}

/// Backoff between submit attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before the retry following attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(63) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}
