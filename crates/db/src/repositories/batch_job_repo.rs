//! Repository for the `batch_jobs` table.
//!
//! Uses `BatchJobStatus` from `models::status` for all status transitions.

use clipcart_core::types::DbId;
use sqlx::PgPool;

use crate::models::batch_job::{BatchJob, CreateBatchJob, JobProgress};
use crate::models::status::BatchJobStatus;

/// Column list for `batch_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, status_id, plan, parameters, \
    total_rows, processed_rows, successful_rows, failed_rows, error_report, \
    submitted_at, started_at, completed_at, created_at, updated_at";

/// Provides persistence for batch generation jobs.
pub struct BatchJobRepo;

impl BatchJobRepo {
    /// Enqueue a new pending job.
    pub async fn create(pool: &PgPool, input: &CreateBatchJob) -> Result<BatchJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO batch_jobs (user_id, status_id, plan, parameters, total_rows) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchJob>(&query)
            .bind(input.user_id)
            .bind(BatchJobStatus::Pending.id())
            .bind(&input.plan)
            .bind(&input.parameters)
            .bind(input.total_rows)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BatchJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batch_jobs WHERE id = $1");
        sqlx::query_as::<_, BatchJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest pending job and mark it running.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so several workers can poll
    /// the same table without double-processing a job.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<BatchJob>, sqlx::Error> {
        let query = format!(
            "UPDATE batch_jobs \
             SET status_id = $1, started_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM batch_jobs \
                 WHERE status_id = $2 \
                 ORDER BY submitted_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BatchJob>(&query)
            .bind(BatchJobStatus::Running.id())
            .bind(BatchJobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the processed/successful/failed counters.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        progress: JobProgress,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_jobs \
             SET processed_rows = $2, successful_rows = $3, failed_rows = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(progress.processed)
        .bind(progress.successful)
        .bind(progress.failed)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job completed, storing the report of its failed rows if any.
    ///
    /// Returns `false` when the job is unknown or already terminal.
    pub async fn mark_completed(
        pool: &PgPool,
        job_id: DbId,
        error_report: Option<&serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, BatchJobStatus::Completed, error_report).await
    }

    /// Mark a job failed and store the serialized error report.
    ///
    /// Returns `false` when the job is unknown or already terminal.
    pub async fn mark_failed(
        pool: &PgPool,
        job_id: DbId,
        error_report: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        Self::finish(pool, job_id, BatchJobStatus::Failed, Some(error_report)).await
    }

    async fn finish(
        pool: &PgPool,
        job_id: DbId,
        status: BatchJobStatus,
        error_report: Option<&serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batch_jobs \
             SET status_id = $2, error_report = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id <> ALL($4)",
        )
        .bind(job_id)
        .bind(status.id())
        .bind(error_report)
        .bind(BatchJobStatus::terminal_ids())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
