//! Subscription plans and the per-plan scheduling tables.
//!
//! Batch size, concurrency, and polling cadence all depend on the plan a
//! user is on. The lookups are exposed both as free functions and through
//! the [`PolicyTables`] trait so the pipeline can be driven by alternative
//! tables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::{ClipDuration, Resolution, VideoModel};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Polling timeout for 720p renders.
pub const TIMEOUT_720P_MS: u64 = 600_000;

/// Polling timeout for 1080p renders.
pub const TIMEOUT_1080P_MS: u64 = 900_000;

/// Divisor turning a timeout budget into a number of poll attempts.
pub const POLL_ATTEMPT_DIVISOR_MS: u64 = 3_000;

/// Extra interval added to every poll on the free plan.
pub const FREE_PLAN_POLL_PENALTY_MS: u64 = 2_000;

/// Elapsed-time boundaries for the polling cadence.
const EARLY_PHASE_MS: u64 = 30_000;
const MIDDLE_PHASE_MS: u64 = 120_000;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }
}

/// How often to poll and how long to keep polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Number of tasks per scheduling chunk.
pub fn batch_size(plan: Plan) -> usize {
    match plan {
        Plan::Free => 5,
        Plan::Basic => 10,
        Plan::Pro => 20,
        Plan::Business => 30,
    }
}

/// In-flight task limit for a task profile.
///
/// The premium model renders slower, so it gets half the slots (never
/// fewer than one).
pub fn concurrency_for(
    plan: Plan,
    model: VideoModel,
    resolution: Resolution,
    duration: ClipDuration,
) -> usize {
    // Columns: 720p/10, 720p/15, 1080p/10, 1080p/15.
    let row: [usize; 4] = match plan {
        Plan::Free => [3, 3, 2, 2],
        Plan::Basic => [5, 4, 3, 2],
        Plan::Pro => [8, 6, 5, 4],
        Plan::Business => [12, 10, 8, 6],
    };
    let column = match (resolution, duration) {
        (Resolution::Hd720, ClipDuration::Short) => 0,
        (Resolution::Hd720, ClipDuration::Long) => 1,
        (Resolution::Hd1080, ClipDuration::Short) => 2,
        (Resolution::Hd1080, ClipDuration::Long) => 3,
    };
    let standard = row[column];
    match model {
        VideoModel::Standard => standard,
        VideoModel::Premium => (standard / 2).max(1),
    }
}

/// Poll cadence for a render that has been running for `elapsed`.
pub fn polling_policy(plan: Plan, resolution: Resolution, elapsed: Duration) -> PollingPolicy {
    let elapsed_ms = elapsed.as_millis() as u64;
    let (early, middle, late, timeout_ms) = match resolution {
        Resolution::Hd720 => (3_000, 5_000, 10_000, TIMEOUT_720P_MS),
        Resolution::Hd1080 => (5_000, 10_000, 15_000, TIMEOUT_1080P_MS),
    };
    let mut interval_ms = if elapsed_ms < EARLY_PHASE_MS {
        early
    } else if elapsed_ms < MIDDLE_PHASE_MS {
        middle
    } else {
        late
    };
    if plan == Plan::Free {
        interval_ms += FREE_PLAN_POLL_PENALTY_MS;
    }
    PollingPolicy {
        interval: Duration::from_millis(interval_ms),
        timeout: Duration::from_millis(timeout_ms),
    }
}

/// Upper bound on status queries for a timeout budget.
pub fn max_poll_attempts(timeout: Duration) -> u32 {
    let attempts = timeout.as_millis() as u64 / POLL_ATTEMPT_DIVISOR_MS;
    attempts.clamp(1, u32::MAX as u64) as u32
}

// ---------------------------------------------------------------------------
// Injectable tables
// ---------------------------------------------------------------------------

/// Scheduling tables consulted by the batch processor.
pub trait PolicyTables: Send + Sync {
    fn batch_size(&self, plan: Plan) -> usize;

    fn concurrency(
        &self,
        plan: Plan,
        model: VideoModel,
        resolution: Resolution,
        duration: ClipDuration,
    ) -> usize;

    fn polling(&self, plan: Plan, resolution: Resolution, elapsed: Duration) -> PollingPolicy;
}

/// The production tables defined in this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanPolicy;

impl PolicyTables for PlanPolicy {
    fn batch_size(&self, plan: Plan) -> usize {
        batch_size(plan)
    }

    fn concurrency(
        &self,
        plan: Plan,
        model: VideoModel,
        resolution: Resolution,
        duration: ClipDuration,
    ) -> usize {
        concurrency_for(plan, model, resolution, duration)
    }

    fn polling(&self, plan: Plan, resolution: Resolution, elapsed: Duration) -> PollingPolicy {
        polling_policy(plan, resolution, elapsed)
    }
}
