//! Repository for the `generated_assets` table.

use clipcart_core::types::DbId;
use sqlx::PgPool;

use crate::models::generated_asset::{CreateGeneratedAsset, GeneratedAsset};

const COLUMNS: &str = "\
    id, job_id, row_index, storage_key, public_url, model, prompt, \
    enhanced_prompt, credits_spent, metadata, created_at";

/// Insert-only access to generated assets.
pub struct GeneratedAssetRepo;

impl GeneratedAssetRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &CreateGeneratedAsset,
    ) -> Result<GeneratedAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO generated_assets \
                 (job_id, row_index, storage_key, public_url, model, prompt, \
                  enhanced_prompt, credits_spent, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GeneratedAsset>(&query)
            .bind(input.job_id)
            .bind(input.row_index)
            .bind(&input.storage_key)
            .bind(&input.public_url)
            .bind(&input.model)
            .bind(&input.prompt)
            .bind(&input.enhanced_prompt)
            .bind(input.credits_spent)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// All assets for a job ordered by source row.
    pub async fn list_by_job(pool: &PgPool, job_id: DbId) -> Result<Vec<GeneratedAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_assets WHERE job_id = $1 ORDER BY row_index ASC, id ASC"
        );
        sqlx::query_as::<_, GeneratedAsset>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
