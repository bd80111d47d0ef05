//! Collaborator contracts consumed by the pipeline.
//!
//! Each external system sits behind an object-safe async trait, and the
//! processor receives the handles bundled in [`Services`]. Production
//! bindings live in [`crate::adapters`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipcart_cloud::StoredObject;
use clipcart_core::stats::ProcessingStats;
use clipcart_core::task::TaskResult;
use clipcart_core::types::{Credits, DbId};
use clipcart_db::models::credit::CreditMovement;
use clipcart_db::models::generated_asset::CreateGeneratedAsset;
use clipcart_generation::{GenerationRequest, TaskStatus};

use crate::error::ServiceError;

/// Credit balance owned by the billing side.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn get_balance(&self, user_id: DbId) -> Result<Credits, ServiceError>;

    async fn has_sufficient_credits(
        &self,
        user_id: DbId,
        amount: Credits,
    ) -> Result<bool, ServiceError>;

    /// Fails if the balance does not cover the amount at call time.
    async fn debit(&self, movement: &CreditMovement) -> Result<(), ServiceError>;
}

/// The external video generation provider.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Queue a render and return the provider's task id.
    async fn submit(&self, request: &GenerationRequest) -> Result<String, ServiceError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ServiceError>;

    /// Fetch the bytes of a finished render.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Durable, publicly addressable object storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
        category: &str,
    ) -> Result<StoredObject, ServiceError>;
}

/// Progress and terminal status of batch jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn update_progress(&self, job_id: DbId, stats: &ProcessingStats)
        -> Result<(), ServiceError>;

    /// `failures` holds the failed task results, empty for a clean batch.
    async fn mark_completed(&self, job_id: DbId, failures: &[TaskResult])
        -> Result<(), ServiceError>;

    async fn mark_failed(&self, job_id: DbId, report: &serde_json::Value)
        -> Result<(), ServiceError>;
}

/// Insert-only store of generated assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Returns the new asset's id.
    async fn insert(&self, asset: &CreateGeneratedAsset) -> Result<DbId, ServiceError>;
}

/// Handles to every collaborator the processor talks to.
#[derive(Clone)]
pub struct Services {
    pub credits: Arc<dyn CreditLedger>,
    pub generation: Arc<dyn GenerationService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jobs: Arc<dyn JobStore>,
    pub assets: Arc<dyn AssetStore>,
}

/// Default upper bound on a single collaborator call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Await a collaborator call, giving up with a transient timeout error
/// once `limit` has elapsed.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::new(format!(
            "operation timed out after {}s",
            limit.as_secs()
        ))),
    }
}
