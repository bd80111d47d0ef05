//! Generated video asset models.

use clipcart_core::types::{Credits, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `generated_assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GeneratedAsset {
    pub id: DbId,
    pub job_id: DbId,
    pub row_index: i32,
    pub storage_key: String,
    pub public_url: String,
    pub model: String,
    pub prompt: String,
    pub enhanced_prompt: Option<String>,
    pub credits_spent: Credits,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for recording a successful generation. Assets are never updated.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGeneratedAsset {
    pub job_id: DbId,
    pub row_index: i32,
    pub storage_key: String,
    pub public_url: String,
    pub model: String,
    pub prompt: String,
    pub enhanced_prompt: Option<String>,
    pub credits_spent: Credits,
    pub metadata: serde_json::Value,
}
