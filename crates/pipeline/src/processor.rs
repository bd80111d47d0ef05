//! Batch entry point.
//!
//! [`BatchProcessor::process_batch`] gates the batch on the user's
//! balance, partitions it into tiers, drains the fast tier and then the
//! slow tier, and keeps the job record in step. Individual task failures
//! never abort a batch; they are returned and stored with the completed
//! job. Only collaborator failures outside task execution abort a batch,
//! and those mark the job failed.

use std::sync::Arc;
use std::time::Duration;

use clipcart_core::cost::batch_cost;
use clipcart_core::plan::{Plan, PolicyTables};
use clipcart_core::priority::{partition, PartitionedTasks, QueueTier};
use clipcart_core::retry::RetryPolicy;
use clipcart_core::stats::ProcessingStats;
use clipcart_core::task::{TaskResult, VideoTask};
use clipcart_core::types::DbId;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::executor::{BatchContext, TaskExecutor};
use crate::scheduler::{TierScheduler, CHUNK_PAUSE};
use crate::services::{Services, CALL_TIMEOUT};

/// Parameters stored on a batch job when it is enqueued.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchParameters {
    pub plan: Plan,
    pub tasks: Vec<VideoTask>,
}

/// Everything needed to run one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub job_id: DbId,
    pub user_id: DbId,
    pub plan: Plan,
    pub tasks: Vec<VideoTask>,
}

impl BatchRequest {
    pub fn from_parameters(job_id: DbId, user_id: DbId, params: BatchParameters) -> Self {
        Self {
            job_id,
            user_id,
            plan: params.plan,
            tasks: params.tasks,
        }
    }
}

/// A batch that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub stats: ProcessingStats,
    /// One result per task, fast tier first.
    pub results: Vec<TaskResult>,
}

impl BatchOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Runs batches against injected services and policy tables.
pub struct BatchProcessor {
    services: Services,
    policy: Arc<dyn PolicyTables>,
    retry: RetryPolicy,
    chunk_pause: Duration,
    call_timeout: Duration,
}

impl BatchProcessor {
    pub fn new(services: Services, policy: Arc<dyn PolicyTables>) -> Self {
        Self {
            services,
            policy,
            retry: RetryPolicy::default(),
            chunk_pause: CHUNK_PAUSE,
            call_timeout: CALL_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_pause(mut self, chunk_pause: Duration) -> Self {
        self.chunk_pause = chunk_pause;
        self
    }

    /// Upper bound on each provider, storage, and ledger call made while
    /// executing a task.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Process a whole batch.
    ///
    /// Returns the final stats and every task result once both tiers
    /// have drained and the job is marked completed. On a batch-level
    /// error the job is marked failed with a serialized report and the
    /// error is returned.
    pub async fn process_batch(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        let job_id = request.job_id;
        let mut stats = ProcessingStats::new(request.tasks.len());

        match self.run(request, &mut stats).await {
            Ok(results) => {
                tracing::info!(
                    job_id,
                    total = stats.total,
                    successful = stats.successful,
                    failed = stats.failed,
                    "Batch completed",
                );
                Ok(BatchOutcome { stats, results })
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Batch failed");
                let report = serde_json::json!({
                    "kind": e.kind(),
                    "message": e.to_string(),
                    "stats": stats,
                    "failed_at": chrono::Utc::now(),
                });
                if let Err(store_err) = self.services.jobs.mark_failed(job_id, &report).await {
                    tracing::error!(job_id, error = %store_err, "Failed to mark job as failed");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: BatchRequest,
        stats: &mut ProcessingStats,
    ) -> Result<Vec<TaskResult>, PipelineError> {
        let ctx = BatchContext {
            job_id: request.job_id,
            user_id: request.user_id,
            plan: request.plan,
        };

        self.check_credits(&ctx, &request.tasks).await?;

        let PartitionedTasks { fast, slow } = partition(request.tasks);
        tracing::info!(
            job_id = ctx.job_id,
            plan = ctx.plan.as_str(),
            fast = fast.len(),
            slow = slow.len(),
            "Batch partitioned",
        );

        let executor = TaskExecutor::new(&self.services, self.policy.as_ref(), self.retry)
            .with_call_timeout(self.call_timeout);
        let scheduler = TierScheduler::new(executor, self.policy.as_ref(), self.chunk_pause);

        let mut results = Vec::with_capacity(stats.total);
        for (tier, tasks) in [(QueueTier::Fast, fast), (QueueTier::Slow, slow)] {
            if tasks.is_empty() {
                continue;
            }
            let outcome = scheduler.process_tier(&ctx, tier, &tasks).await;
            stats.record_tier(tier, &outcome.results);

            tracing::info!(
                job_id = ctx.job_id,
                tier = tier.as_str(),
                chunks = outcome.chunks.len(),
                final_concurrency = outcome.chunks.last().map(|c| c.concurrency),
                failed_in_tier = outcome.chunks.iter().map(|c| c.failed).sum::<usize>(),
                processed = stats.processed,
                successful = stats.successful,
                failed = stats.failed,
                "Tier drained",
            );
            results.extend(outcome.results);
            self.services
                .jobs
                .update_progress(ctx.job_id, stats)
                .await
                .map_err(PipelineError::JobStore)?;
        }

        let failures: Vec<TaskResult> = results.iter().filter(|r| !r.success).cloned().collect();
        self.services
            .jobs
            .mark_completed(ctx.job_id, &failures)
            .await
            .map_err(PipelineError::JobStore)?;
        Ok(results)
    }

    /// Reject the batch up front if the balance cannot cover every task.
    ///
    /// This is a check, not a reservation: debits happen per task later.
    async fn check_credits(
        &self,
        ctx: &BatchContext,
        tasks: &[VideoTask],
    ) -> Result<(), PipelineError> {
        let required = batch_cost(tasks);
        let available = self
            .services
            .credits
            .get_balance(ctx.user_id)
            .await
            .map_err(PipelineError::Credits)?;

        if available < required {
            tracing::warn!(
                job_id = ctx.job_id,
                user_id = ctx.user_id,
                required,
                available,
                "Insufficient credits for batch",
            );
            return Err(PipelineError::InsufficientCredits {
                required,
                available,
            });
        }
        Ok(())
    }
}
