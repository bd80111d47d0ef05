//! Chunked tier scheduling with a failure-rate circuit.
//!
//! A tier is cut into chunks of the plan's batch size. Each chunk runs
//! in fixed windows of `concurrency` tasks: a window is launched
//! together and fully settles before the next one starts. Concurrency is
//! computed once from the first chunk's profile and only ever decreases
//! afterwards.

use std::time::Duration;

use clipcart_core::concurrency::{failure_rate, next_concurrency};
use clipcart_core::plan::PolicyTables;
use clipcart_core::priority::{ChunkProfile, QueueTier};
use clipcart_core::task::{TaskResult, VideoTask};
use futures::future::join_all;

use crate::executor::{BatchContext, TaskExecutor};

/// Pause between consecutive chunks of a tier.
pub const CHUNK_PAUSE: Duration = Duration::from_secs(2);

/// What happened in one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    /// Rows in submission order.
    pub rows: Vec<u32>,
    /// Window size the chunk ran with.
    pub concurrency: usize,
    pub failed: usize,
}

/// Results of one drained tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierOutcome {
    /// One result per task. Order within a window follows settlement.
    pub results: Vec<TaskResult>,
    pub chunks: Vec<ChunkReport>,
}

/// Drains one tier at a time.
pub struct TierScheduler<'a> {
    executor: TaskExecutor<'a>,
    policy: &'a dyn PolicyTables,
    chunk_pause: Duration,
}

impl<'a> TierScheduler<'a> {
    pub fn new(executor: TaskExecutor<'a>, policy: &'a dyn PolicyTables, chunk_pause: Duration) -> Self {
        Self {
            executor,
            policy,
            chunk_pause,
        }
    }

    /// Process every task of a tier and return one result per task.
    pub async fn process_tier(
        &self,
        ctx: &BatchContext,
        tier: QueueTier,
        tasks: &[VideoTask],
    ) -> TierOutcome {
        let mut outcome = TierOutcome::default();
        let chunk_size = self.policy.batch_size(ctx.plan).max(1);
        let chunk_count = tasks.len().div_ceil(chunk_size);

        let mut concurrency: Option<usize> = None;
        let mut processed = 0usize;
        let mut failed = 0usize;

        for (index, chunk) in tasks.chunks(chunk_size).enumerate() {
            let current = match concurrency {
                Some(c) => c,
                None => {
                    let c = self.initial_concurrency(ctx, chunk);
                    concurrency = Some(c);
                    c
                }
            };

            tracing::info!(
                job_id = ctx.job_id,
                tier = tier.as_str(),
                chunk = index + 1,
                chunks = chunk_count,
                size = chunk.len(),
                concurrency = current,
                "Processing chunk",
            );

            let results = self.run_chunk(ctx, chunk, current).await;
            let chunk_failed = results.iter().filter(|r| !r.success).count();
            processed += results.len();
            failed += chunk_failed;

            outcome.chunks.push(ChunkReport {
                rows: chunk.iter().map(|t| t.row_index).collect(),
                concurrency: current,
                failed: chunk_failed,
            });
            outcome.results.extend(results);

            let next = next_concurrency(current, processed, failed);
            if next < current {
                tracing::warn!(
                    job_id = ctx.job_id,
                    tier = tier.as_str(),
                    failure_rate = failure_rate(processed, failed),
                    from = current,
                    to = next,
                    "High failure rate, reducing concurrency",
                );
                concurrency = Some(next);
            }

            if index + 1 < chunk_count {
                tokio::time::sleep(self.chunk_pause).await;
            }
        }

        outcome
    }

    /// Concurrency for the first chunk of a tier.
    ///
    /// Assumes the chunk is homogeneous in model; see [`ChunkProfile`].
    fn initial_concurrency(&self, ctx: &BatchContext, chunk: &[VideoTask]) -> usize {
        let Some(profile) = ChunkProfile::from_chunk(chunk) else {
            return 1;
        };
        self.policy
            .concurrency(ctx.plan, profile.model, profile.resolution, profile.duration)
            .max(1)
    }

    /// Run a chunk in fixed windows of `concurrency` tasks.
    async fn run_chunk(
        &self,
        ctx: &BatchContext,
        chunk: &[VideoTask],
        concurrency: usize,
    ) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(chunk.len());
        for window in chunk.chunks(concurrency.max(1)) {
            let settled = join_all(window.iter().map(|task| self.executor.execute(ctx, task))).await;
            results.extend(settled);
        }
        results
    }
}
