//! Adaptive status polling for submitted renders.
//!
//! The interval between status queries is looked up again before every
//! sleep, so it widens as the render runs longer. Giving up only stops
//! watching; the provider-side render is not cancelled.

use std::time::Duration;

use clipcart_core::plan::{max_poll_attempts, Plan, PolicyTables};
use clipcart_core::task::Resolution;
use clipcart_generation::TaskState;
use tokio::time::Instant;

use crate::error::TaskError;
use crate::services::{bounded, GenerationService, CALL_TIMEOUT};

/// Polls one provider task until it reaches a terminal state.
pub struct AdaptivePoller<'a> {
    generation: &'a dyn GenerationService,
    policy: &'a dyn PolicyTables,
    call_timeout: Duration,
}

impl<'a> AdaptivePoller<'a> {
    pub fn new(generation: &'a dyn GenerationService, policy: &'a dyn PolicyTables) -> Self {
        Self {
            generation,
            policy,
            call_timeout: CALL_TIMEOUT,
        }
    }

    /// Bound each status query; a query that outlives it fails as a
    /// transient timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Wait for `task_id` to finish and return its result URL.
    ///
    /// `started` is when the render was submitted; elapsed time from it
    /// drives the interval lookup. The attempt budget is
    /// `timeout / 3000` for the resolution's timeout.
    pub async fn wait_for_result(
        &self,
        plan: Plan,
        resolution: Resolution,
        task_id: &str,
        started: Instant,
    ) -> Result<String, TaskError> {
        let timeout = self.policy.polling(plan, resolution, Duration::ZERO).timeout;
        let max_attempts = max_poll_attempts(timeout);

        for attempt in 1..=max_attempts {
            let status = bounded(self.call_timeout, self.generation.task_status(task_id))
                .await
                .map_err(TaskError::Status)?;

            match status.state {
                TaskState::Completed => {
                    return status
                        .result_url
                        .filter(|url| !url.trim().is_empty())
                        .ok_or(TaskError::MissingResultUrl);
                }
                TaskState::Failed => {
                    let message = status
                        .error_message
                        .unwrap_or_else(|| "provider reported failure".to_string());
                    return Err(TaskError::GenerationFailed(message));
                }
                TaskState::Pending | TaskState::Unknown => {}
            }

            if attempt < max_attempts {
                let interval = self
                    .policy
                    .polling(plan, resolution, started.elapsed())
                    .interval;
                tracing::trace!(
                    task_id,
                    attempt,
                    interval_ms = interval.as_millis() as u64,
                    "Render still running",
                );
                tokio::time::sleep(interval).await;
            }
        }

        tracing::warn!(task_id, attempts = max_attempts, "Gave up polling render");
        Err(TaskError::PollTimeout {
            attempts: max_attempts,
        })
    }
}
