//! Batch job claim loop.
//!
//! Polls for pending batch jobs every `poll_interval`, claims them with
//! [`BatchJobRepo::claim_next`] (`FOR UPDATE SKIP LOCKED`, so several
//! workers can share a queue), and hands each one to the
//! [`BatchProcessor`]. A running batch is never interrupted; cancellation
//! is observed between jobs.

use std::time::Duration;

use clipcart_core::types::DbId;
use clipcart_db::models::batch_job::BatchJob;
use clipcart_db::repositories::BatchJobRepo;
use clipcart_pipeline::{BatchOutcome, BatchParameters, BatchProcessor, BatchRequest, PipelineError};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What happened to a claimed job.
#[derive(Debug)]
pub enum JobOutcome {
    /// The batch ran to the end; failed rows are listed in `batch`.
    Completed { job_id: DbId, batch: BatchOutcome },
    /// The batch ran and was aborted; the processor already marked it failed.
    Failed { job_id: DbId, error: PipelineError },
    /// The stored parameters could not be decoded.
    Rejected { job_id: DbId, reason: String },
}

/// Decode a claimed job into a batch request.
pub fn batch_request(job: &BatchJob) -> Result<BatchRequest, serde_json::Error> {
    let params: BatchParameters = serde_json::from_value(job.parameters.clone())?;
    Ok(BatchRequest::from_parameters(job.id, job.user_id, params))
}

/// Long-lived loop feeding pending jobs into the processor.
pub struct JobRunner {
    pool: PgPool,
    processor: BatchProcessor,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(pool: PgPool, processor: BatchProcessor) -> Self {
        Self {
            pool,
            processor,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(error = %e, "Job claim cycle failed");
                    }
                }
            }
        }
    }

    /// Process pending jobs until none are left or shutdown is requested.
    async fn drain(&self, cancel: &CancellationToken) -> Result<usize, sqlx::Error> {
        let mut handled = 0;
        while !cancel.is_cancelled() {
            match self.run_next().await? {
                Some(_) => handled += 1,
                None => break,
            }
        }
        Ok(handled)
    }

    /// Claim and process one pending job, if any.
    pub async fn run_next(&self) -> Result<Option<JobOutcome>, sqlx::Error> {
        let Some(job) = BatchJobRepo::claim_next(&self.pool).await? else {
            return Ok(None);
        };
        tracing::info!(
            job_id = job.id,
            user_id = job.user_id,
            plan = %job.plan,
            total_rows = job.total_rows,
            "Batch job claimed",
        );

        let request = match batch_request(&job) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Invalid batch parameters");
                let report = serde_json::json!({
                    "kind": "invalid_parameters",
                    "message": e.to_string(),
                    "failed_at": chrono::Utc::now(),
                });
                BatchJobRepo::mark_failed(&self.pool, job.id, &report).await?;
                return Ok(Some(JobOutcome::Rejected {
                    job_id: job.id,
                    reason: e.to_string(),
                }));
            }
        };

        let outcome = match self.processor.process_batch(request).await {
            Ok(batch) => JobOutcome::Completed {
                job_id: job.id,
                batch,
            },
            Err(error) => JobOutcome::Failed {
                job_id: job.id,
                error,
            },
        };
        Ok(Some(outcome))
    }
}
