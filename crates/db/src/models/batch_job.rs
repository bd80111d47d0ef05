//! Batch job entity models and DTOs.

use clipcart_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `batch_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchJob {
    pub id: DbId,
    pub user_id: DbId,
    pub status_id: StatusId,
    pub plan: String,
    pub parameters: serde_json::Value,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub successful_rows: i32,
    pub failed_rows: i32,
    pub error_report: Option<serde_json::Value>,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enqueuing a new batch job.
#[derive(Debug, Deserialize)]
pub struct CreateBatchJob {
    pub user_id: DbId,
    pub plan: String,
    /// `{ "plan": ..., "tasks": [...] }` as submitted.
    pub parameters: serde_json::Value,
    pub total_rows: i32,
}

/// Progress counters written after each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub processed: i32,
    pub successful: i32,
    pub failed: i32,
}
