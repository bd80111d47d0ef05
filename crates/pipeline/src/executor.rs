//! Single-task execution with bounded retry.
//!
//! One attempt runs: credit check, submit, poll, download, upload,
//! debit, record. Side effects are not rolled back when a later step
//! fails, so a failed attempt may leave an uploaded object behind.

use std::time::Duration;

use clipcart_core::plan::{Plan, PolicyTables};
use clipcart_core::retry::RetryPolicy;
use clipcart_core::task::{TaskResult, VideoTask};
use clipcart_core::types::DbId;
use clipcart_db::models::credit::{CreditMovement, SOURCE_VIDEO_GENERATION};
use clipcart_db::models::generated_asset::CreateGeneratedAsset;
use clipcart_generation::GenerationRequest;
use tokio::time::Instant;

use crate::error::TaskError;
use crate::poller::AdaptivePoller;
use crate::services::{bounded, Services, CALL_TIMEOUT};

/// MIME type of generated videos.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Storage category of generated videos.
pub const VIDEO_CATEGORY: &str = "generated-video";

/// Identity of the batch a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchContext {
    pub job_id: DbId,
    pub user_id: DbId,
    pub plan: Plan,
}

/// Storage key for a task's video: `videos/{job}/row-{row}-{uuid}.mp4`.
pub fn storage_key(job_id: DbId, row_index: u32) -> String {
    format!(
        "videos/{job_id}/row-{row_index}-{}.mp4",
        uuid::Uuid::new_v4()
    )
}

/// Ledger reference id for a task's debit.
pub fn debit_reference(job_id: DbId, row_index: u32) -> String {
    format!("{job_id}:{row_index}")
}

/// A stored and billed video.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GeneratedVideo {
    asset_id: DbId,
    url: String,
}

/// Runs tasks against the injected services.
pub struct TaskExecutor<'a> {
    services: &'a Services,
    policy: &'a dyn PolicyTables,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(services: &'a Services, policy: &'a dyn PolicyTables, retry: RetryPolicy) -> Self {
        Self {
            services,
            policy,
            retry,
            call_timeout: CALL_TIMEOUT,
        }
    }

    /// Bound every collaborator call of an attempt. A call that outlives
    /// the limit fails the attempt with a transient timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run a task to a terminal result, retrying transient failures.
    ///
    /// Never returns an error: every failure becomes a failed
    /// [`TaskResult`] carrying the last message.
    pub async fn execute(&self, ctx: &BatchContext, task: &VideoTask) -> TaskResult {
        let row = task.row_index;

        if let Err(e) = task.validate() {
            tracing::warn!(job_id = ctx.job_id, row_index = row, error = %e, "Task rejected");
            return TaskResult::failed(row, e.to_string(), 0);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.process_task(ctx, task).await {
                Ok(video) => {
                    tracing::info!(
                        job_id = ctx.job_id,
                        row_index = row,
                        asset_id = video.asset_id,
                        attempt,
                        "Task completed",
                    );
                    return TaskResult::succeeded(row, video.asset_id, video.url, attempt - 1);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::warn!(
                        job_id = ctx.job_id,
                        row_index = row,
                        attempt,
                        error = %e,
                        "Task failed with non-retryable error",
                    );
                    return TaskResult::failed(row, e.to_string(), attempt - 1);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        job_id = ctx.job_id,
                        row_index = row,
                        attempts = attempt,
                        error = %e,
                        "Task failed after all retries",
                    );
                    return TaskResult::failed(row, e.to_string(), self.retry.max_attempts);
                }
                Err(e) => {
                    let delay = self.retry.backoff_delay(attempt);
                    tracing::warn!(
                        job_id = ctx.job_id,
                        row_index = row,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Task attempt failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One attempt at a task.
    async fn process_task(
        &self,
        ctx: &BatchContext,
        task: &VideoTask,
    ) -> Result<GeneratedVideo, TaskError> {
        let credits = &self.services.credits;
        let limit = self.call_timeout;
        let cost = task.credit_cost();

        let sufficient = bounded(limit, credits.has_sufficient_credits(ctx.user_id, cost))
            .await
            .map_err(TaskError::CreditCheck)?;
        if !sufficient {
            let available = bounded(limit, credits.get_balance(ctx.user_id))
                .await
                .map_err(TaskError::CreditCheck)?;
            return Err(TaskError::InsufficientCredits {
                required: cost,
                available,
            });
        }

        let request = GenerationRequest::for_task(task);
        let provider_task_id = bounded(limit, self.services.generation.submit(&request))
            .await
            .map_err(TaskError::Submit)?;
        let submitted_at = Instant::now();
        tracing::debug!(
            job_id = ctx.job_id,
            row_index = task.row_index,
            provider_task_id = %provider_task_id,
            mode = ?request.mode,
            "Render submitted",
        );

        let poller = AdaptivePoller::new(self.services.generation.as_ref(), self.policy)
            .with_call_timeout(limit);
        let result_url = poller
            .wait_for_result(ctx.plan, task.resolution, &provider_task_id, submitted_at)
            .await?;

        let bytes = bounded(limit, self.services.generation.download(&result_url))
            .await
            .map_err(TaskError::Download)?;

        let key = storage_key(ctx.job_id, task.row_index);
        let stored = bounded(
            limit,
            self.services
                .storage
                .upload(bytes, &key, VIDEO_CONTENT_TYPE, VIDEO_CATEGORY),
        )
        .await
        .map_err(TaskError::Upload)?;

        let movement = CreditMovement {
            user_id: ctx.user_id,
            amount: cost,
            source: SOURCE_VIDEO_GENERATION.to_string(),
            description: format!("Video generation for row {}", task.row_index),
            reference_id: debit_reference(ctx.job_id, task.row_index),
        };
        bounded(limit, credits.debit(&movement))
            .await
            .map_err(TaskError::Debit)?;

        let asset = CreateGeneratedAsset {
            job_id: ctx.job_id,
            row_index: task.row_index as i32,
            storage_key: stored.key,
            public_url: stored.url.clone(),
            model: task.model.as_str().to_string(),
            prompt: task.prompt.clone(),
            enhanced_prompt: task.enhanced_prompt.clone(),
            credits_spent: cost,
            metadata: task.metadata(),
        };
        let asset_id = bounded(limit, self.services.assets.insert(&asset))
            .await
            .map_err(TaskError::Record)?;

        Ok(GeneratedVideo {
            asset_id,
            url: stored.url,
        })
    }
}
