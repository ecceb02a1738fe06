//! Reconnection policy and backoff calculation.
//!
//! The connection supervisor consults a [`ReconnectPolicy`] after every drop:
//! it passes the number of reconnect attempts already made since the drop and
//! sleeps for the returned delay before trying again. Policies are pure values,
//! so schedules can be checked without any runtime.
//!
//! [`ForeverRetryPolicy`] never gives up: the first retry is immediate, later
//! ones back off exponentially up to a cap and stay there.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Delay schedule consulted by the transport after every disconnect.
pub trait ReconnectPolicy: Send + Sync {
    /// Delay before the next attempt, given how many attempts already failed.
    fn next_delay(&self, previous_attempts: u32) -> Duration;
}

/// Reconnect forever with capped exponential backoff.
///
/// Schedule: `0, base, 2·base, 4·base, … , max, max, …`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForeverRetryPolicy {
    /// Base delay for exponential backoff in ms.
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in ms.
    pub max_delay_ms: u64,
}

impl ForeverRetryPolicy {
    /// Create a policy with explicit bounds.
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }
}

impl Default for ForeverRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }
}

impl ReconnectPolicy for ForeverRetryPolicy {
    fn next_delay(&self, previous_attempts: u32) -> Duration {
        if previous_attempts == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(calculate_backoff_delay(
            previous_attempts - 1,
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

/// Exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
///
/// `attempt` is zero-based. Saturates instead of overflowing for large attempt
/// counts.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
