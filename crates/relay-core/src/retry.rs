//! Backoff calculation and retry bookkeeping.
//!
//! - [`BackoffConfig`]: base/max delay and jitter for reconnect-style retries
//! - [`calculate_backoff_delay`]: deterministic exponential backoff
//! - [`RetryState`]: attempt counter owned by one in-flight operation

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Smallest delay ever returned, in milliseconds.
pub const MIN_DELAY_MS: u64 = 1;

/// Backoff parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in ms.
    pub base_delay_ms: u64,
    /// Upper bound on the exponential part, in ms.
    pub max_delay_ms: u64,
    /// Extra headroom added on top of the capped delay (0.0–1.0).
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl BackoffConfig {
    /// Check that the parameters describe a real wait.
    ///
    /// Both delays must be positive, `max_delay_ms` must not be below
    /// `base_delay_ms`, and `jitter_factor` must lie in `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("baseDelayMs must be positive".into());
        }
        if self.max_delay_ms == 0 {
            return Err("maxDelayMs must be positive".into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(format!(
                "maxDelayMs ({}) must not be below baseDelayMs ({})",
                self.max_delay_ms, self.base_delay_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(format!(
                "jitterFactor must be within 0.0..=1.0, got {}",
                self.jitter_factor
            ));
        }
        Ok(())
    }

    /// Delay to wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff, capped and scaled by the jitter headroom.
///
/// Formula: `min(max_delay, base_delay * 2^(attempt - 1)) * (1 + jitter)`
///
/// Non-decreasing in `attempt` and bounded by `max_delay * (1 + jitter)`.
/// Attempt `0` is treated as attempt `1`. The result is never below 1 ms,
/// even when `base_delay_ms` or `max_delay_ms` is zero.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
) -> u64 {
    let exponent = attempt.saturating_sub(1).min(31);
    let exponential = base_delay_ms.saturating_mul(1u64 << exponent);
    let capped = exponential.min(max_delay_ms).max(MIN_DELAY_MS);

    let jitter = jitter_factor.clamp(0.0, 1.0);
    let with_jitter = (capped as f64) * (1.0 + jitter);

    with_jitter.round() as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Retry state
// ─────────────────────────────────────────────────────────────────────────────

/// Attempt counter for one retried operation.
///
/// Incremented on every failure and reset to zero on success.
#[derive(Debug, Default)]
pub struct RetryState {
    attempt: AtomicU32,
}

impl RetryState {
    /// A fresh counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures recorded since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Record a failure and return the new attempt number.
    pub fn record_failure(&self) -> u32 {
        self.attempt.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// Reset after a success, returning how many failures preceded it.
    pub fn reset(&self) -> u32 {
        self.attempt.swap(0, Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
