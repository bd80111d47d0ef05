//! Credit account and ledger models.

use clipcart_core::billing::CreditGrant;
use clipcart_core::types::{Credits, DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ledger source for video generation debits.
pub const SOURCE_VIDEO_GENERATION: &str = "video_generation";

/// Ledger source for plan purchases and renewals.
pub const SOURCE_SUBSCRIPTION: &str = "subscription";

/// A row from the `credit_ledger` table. Debits have negative amounts.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditLedgerEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub amount: Credits,
    pub source: String,
    pub description: String,
    pub reference_id: String,
    pub created_at: Timestamp,
}

/// DTO describing a balance change.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditMovement {
    pub user_id: DbId,
    /// Always positive; direction is given by the repository call.
    pub amount: Credits,
    pub source: String,
    pub description: String,
    pub reference_id: String,
}

impl From<&CreditGrant> for CreditMovement {
    fn from(grant: &CreditGrant) -> Self {
        Self {
            user_id: grant.user_id,
            amount: grant.amount,
            source: SOURCE_SUBSCRIPTION.to_string(),
            description: format!("{} plan allowance", grant.plan.as_str()),
            reference_id: grant.reference_id.clone(),
        }
    }
}

/// Errors from credit operations.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("Insufficient credits for user {user_id}: required {required}, available {available}")]
    Insufficient {
        user_id: DbId,
        required: Credits,
        available: Credits,
    },

    #[error("Credit amount must be positive, got {0}")]
    InvalidAmount(Credits),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
