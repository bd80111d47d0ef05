//! Failure-rate circuit for per-tier concurrency.
//!
//! Concurrency only ever goes down within a tier.

/// Failure rate above which concurrency is reduced.
pub const FAILURE_RATE_THRESHOLD: f64 = 0.3;

/// Minimum tasks processed in the tier before the rate is trusted.
pub const MIN_SAMPLES: usize = 10;

/// Multiplier applied to concurrency when the circuit trips.
pub const REDUCTION_FACTOR: f64 = 0.6;

/// Cumulative failure rate; zero when nothing has been processed.
pub fn failure_rate(processed: usize, failed: usize) -> f64 {
    if processed == 0 {
        0.0
    } else {
        failed as f64 / processed as f64
    }
}

/// Concurrency for the next chunk given the tier's running totals.
///
/// Returns `current` unchanged unless at least [`MIN_SAMPLES`] tasks have
/// been processed and the failure rate exceeds the threshold, in which
/// case it returns `max(1, floor(current * 0.6))`.
pub fn next_concurrency(current: usize, processed: usize, failed: usize) -> usize {
    if processed >= MIN_SAMPLES && failure_rate(processed, failed) > FAILURE_RATE_THRESHOLD {
        ((current as f64 * REDUCTION_FACTOR).floor() as usize).max(1)
    } else {
        current
    }
}
