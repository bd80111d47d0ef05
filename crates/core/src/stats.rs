//! Aggregate counters for one batch run.

use serde::{Deserialize, Serialize};

use crate::priority::QueueTier;
use crate::task::TaskResult;

/// Running totals for a batch.
///
/// Counters only ever increase, and `processed == successful + failed`
/// holds after every call to [`ProcessingStats::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub fast_queue_completed: usize,
    pub slow_queue_completed: usize,
}

impl ProcessingStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count one settled task.
    pub fn record(&mut self, tier: QueueTier, result: &TaskResult) {
        self.processed += 1;
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        match tier {
            QueueTier::Fast => self.fast_queue_completed += 1,
            QueueTier::Slow => self.slow_queue_completed += 1,
        }
    }

    /// Count every result of a settled tier.
    pub fn record_tier<'a>(
        &mut self,
        tier: QueueTier,
        results: impl IntoIterator<Item = &'a TaskResult>,
    ) {
        for result in results {
            self.record(tier, result);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}
