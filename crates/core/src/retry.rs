//! Transient-error classification and exponential backoff.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum attempts per task, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles for each later attempt.
pub const BASE_DELAY: Duration = Duration::from_millis(2_000);

/// Error message signatures that indicate a transient failure.
///
/// Status codes only count in the forms HTTP clients render them:
/// `error (503)`, `HTTP 503`, `status 503`, or followed by the reason
/// phrase. A bare number such as an id never matches.
pub const RETRYABLE_PATTERN: &str = concat!(
    r"(?i)timeout|timed out|etimedout|econnreset|econnrefused|enotfound",
    r"|connection reset|connection refused|\bdns\b|socket hang up|rate limit|too many requests",
    r"|\((?:429|500|502|503|504)\)",
    r"|\b(?:http|status(?: code)?)[\s:/]*(?:429|500|502|503|504)\b",
    r"|\b(?:500 internal server error|502 bad gateway|503 service unavailable|504 gateway timeout)",
);

static RETRYABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RETRYABLE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// `true` if an error message matches one of the transient signatures.
pub fn is_retryable_message(message: &str) -> bool {
    RETRYABLE_RE.is_match(message)
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Attempt budget and backoff base for task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after attempt `attempt` (1-based) fails.
    ///
    /// `base * 2^(attempt - 1)`: 2 s after the first attempt, 4 s after
    /// the second.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }
}
