//! Production bindings of the collaborator traits.
//!
//! Postgres-backed ledger, job store, and asset store over a shared
//! pool, plus the generation and storage clients from their own crates.

use std::sync::Arc;

use async_trait::async_trait;
use clipcart_cloud::{S3Storage, StoredObject};
use clipcart_core::stats::ProcessingStats;
use clipcart_core::task::TaskResult;
use clipcart_core::types::{Credits, DbId};
use clipcart_db::models::batch_job::JobProgress;
use clipcart_db::models::credit::{CreditError, CreditMovement};
use clipcart_db::models::generated_asset::CreateGeneratedAsset;
use clipcart_db::repositories::{BatchJobRepo, CreditRepo, GeneratedAssetRepo};
use clipcart_generation::{GenerationApi, GenerationRequest, TaskStatus};
use sqlx::PgPool;

use crate::error::ServiceError;
use crate::services::{
    AssetStore, CreditLedger, GenerationService, JobStore, ObjectStorage, Services,
};

/// Bundle the Postgres-backed stores with the given provider and storage.
pub fn pg_services(
    pool: PgPool,
    generation: Arc<dyn GenerationService>,
    storage: Arc<dyn ObjectStorage>,
) -> Services {
    Services {
        credits: Arc::new(PgCreditLedger::new(pool.clone())),
        generation,
        storage,
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        assets: Arc::new(PgAssetStore::new(pool)),
    }
}

fn service_error(err: &(dyn std::error::Error + 'static)) -> ServiceError {
    ServiceError::from_error(err)
}

/// A rejected debit is final; only database trouble may clear up.
fn debit_error(err: CreditError) -> ServiceError {
    match err {
        CreditError::Insufficient { .. } | CreditError::InvalidAmount(_) => {
            ServiceError::permanent_from_error(&err)
        }
        CreditError::Database(_) => service_error(&err),
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`CreditLedger`] over the `credit_accounts` table.
#[derive(Clone)]
pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for PgCreditLedger {
    async fn get_balance(&self, user_id: DbId) -> Result<Credits, ServiceError> {
        CreditRepo::get_balance(&self.pool, user_id)
            .await
            .map_err(|e| service_error(&e))
    }

    async fn has_sufficient_credits(
        &self,
        user_id: DbId,
        amount: Credits,
    ) -> Result<bool, ServiceError> {
        CreditRepo::has_sufficient(&self.pool, user_id, amount)
            .await
            .map_err(|e| service_error(&e))
    }

    async fn debit(&self, movement: &CreditMovement) -> Result<(), ServiceError> {
        CreditRepo::debit(&self.pool, movement)
            .await
            .map(|_| ())
            .map_err(debit_error)
    }
}

/// [`JobStore`] over the `batch_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_progress(stats: &ProcessingStats) -> JobProgress {
    let clamp = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
    JobProgress {
        processed: clamp(stats.processed),
        successful: clamp(stats.successful),
        failed: clamp(stats.failed),
    }
}

/// Report stored on a completed job whose batch had failed rows.
fn failure_report(failures: &[TaskResult]) -> Option<serde_json::Value> {
    if failures.is_empty() {
        return None;
    }
    let rows: Vec<serde_json::Value> = failures
        .iter()
        .map(|r| {
            serde_json::json!({
                "row_index": r.row_index,
                "error": r.error,
                "retries": r.retries,
            })
        })
        .collect();
    Some(serde_json::json!({
        "kind": "task_failures",
        "failed": rows.len(),
        "failures": rows,
    }))
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn update_progress(
        &self,
        job_id: DbId,
        stats: &ProcessingStats,
    ) -> Result<(), ServiceError> {
        BatchJobRepo::update_progress(&self.pool, job_id, to_progress(stats))
            .await
            .map_err(|e| service_error(&e))
    }

    async fn mark_completed(
        &self,
        job_id: DbId,
        failures: &[TaskResult],
    ) -> Result<(), ServiceError> {
        let report = failure_report(failures);
        let updated = BatchJobRepo::mark_completed(&self.pool, job_id, report.as_ref())
            .await
            .map_err(|e| service_error(&e))?;
        if !updated {
            tracing::warn!(job_id, "Job already finished, completion not recorded");
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: DbId,
        report: &serde_json::Value,
    ) -> Result<(), ServiceError> {
        let updated = BatchJobRepo::mark_failed(&self.pool, job_id, report)
            .await
            .map_err(|e| service_error(&e))?;
        if !updated {
            tracing::warn!(job_id, "Job already finished, failure not recorded");
        }
        Ok(())
    }
}

/// [`AssetStore`] over the `generated_assets` table.
#[derive(Clone)]
pub struct PgAssetStore {
    pool: PgPool,
}

impl PgAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn insert(&self, asset: &CreateGeneratedAsset) -> Result<DbId, ServiceError> {
        GeneratedAssetRepo::insert(&self.pool, asset)
            .await
            .map(|row| row.id)
            .map_err(|e| service_error(&e))
    }
}

// ---------------------------------------------------------------------------
// HTTP / object storage
// ---------------------------------------------------------------------------

#[async_trait]
impl GenerationService for GenerationApi {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        self.submit_video(request)
            .await
            .map(|r| r.task_id)
            .map_err(|e| service_error(&e))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ServiceError> {
        self.get_task_status(task_id)
            .await
            .map_err(|e| service_error(&e))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        GenerationApi::download(self, url)
            .await
            .map_err(|e| service_error(&e))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
        category: &str,
    ) -> Result<StoredObject, ServiceError> {
        S3Storage::upload(self, bytes, key, content_type, category)
            .await
            .map_err(|e| service_error(&e))
    }
}
