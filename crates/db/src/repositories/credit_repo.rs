//! Repository for `credit_accounts` and `credit_ledger`.
//!
//! Every balance change writes a ledger row in the same transaction.
//! Debits never take a balance below zero.

use clipcart_core::types::{Credits, DbId};
use sqlx::PgPool;

use crate::models::credit::{CreditError, CreditLedgerEntry, CreditMovement};

const LEDGER_COLUMNS: &str =
    "id, user_id, amount, source, description, reference_id, created_at";

/// Credit balance operations.
pub struct CreditRepo;

impl CreditRepo {
    /// Current balance. Users without an account have zero credits.
    pub async fn get_balance(pool: &PgPool, user_id: DbId) -> Result<Credits, sqlx::Error> {
        let balance: Option<Credits> =
            sqlx::query_scalar("SELECT balance FROM credit_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(balance.unwrap_or(0))
    }

    pub async fn has_sufficient(
        pool: &PgPool,
        user_id: DbId,
        amount: Credits,
    ) -> Result<bool, sqlx::Error> {
        Ok(Self::get_balance(pool, user_id).await? >= amount)
    }

    /// Subtract credits and append a negative ledger entry.
    ///
    /// Fails with [`CreditError::Insufficient`] if the balance does not
    /// cover `amount` at the moment of the call. Returns the new balance.
    pub async fn debit(pool: &PgPool, movement: &CreditMovement) -> Result<Credits, CreditError> {
        if movement.amount <= 0 {
            return Err(CreditError::InvalidAmount(movement.amount));
        }

        let mut tx = pool.begin().await?;

        let new_balance: Option<Credits> = sqlx::query_scalar(
            "UPDATE credit_accounts \
             SET balance = balance - $2, updated_at = NOW() \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(movement.user_id)
        .bind(movement.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_balance) = new_balance else {
            tx.rollback().await?;
            let available = Self::get_balance(pool, movement.user_id).await?;
            return Err(CreditError::Insufficient {
                user_id: movement.user_id,
                required: movement.amount,
                available,
            });
        };

        sqlx::query(
            "INSERT INTO credit_ledger (user_id, amount, source, description, reference_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(movement.user_id)
        .bind(-movement.amount)
        .bind(&movement.source)
        .bind(&movement.description)
        .bind(&movement.reference_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = movement.user_id,
            amount = movement.amount,
            reference_id = %movement.reference_id,
            new_balance,
            "Credits debited",
        );
        Ok(new_balance)
    }

    /// Add credits, creating the account if needed.
    ///
    /// Idempotent on `reference_id`: a repeated grant is ignored and
    /// returns `false`.
    pub async fn grant(pool: &PgPool, movement: &CreditMovement) -> Result<bool, CreditError> {
        if movement.amount <= 0 {
            return Err(CreditError::InvalidAmount(movement.amount));
        }

        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO credit_accounts (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(movement.user_id)
            .execute(&mut *tx)
            .await?;

        let inserted: Option<DbId> = sqlx::query_scalar(
            "INSERT INTO credit_ledger (user_id, amount, source, description, reference_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (reference_id) WHERE amount > 0 DO NOTHING \
             RETURNING id",
        )
        .bind(movement.user_id)
        .bind(movement.amount)
        .bind(&movement.source)
        .bind(&movement.description)
        .bind(&movement.reference_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            tracing::info!(
                user_id = movement.user_id,
                reference_id = %movement.reference_id,
                "Duplicate credit grant ignored",
            );
            return Ok(false);
        }

        sqlx::query(
            "UPDATE credit_accounts SET balance = balance + $2, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(movement.user_id)
        .bind(movement.amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Ledger entries for a user, newest first.
    pub async fn list_ledger(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<CreditLedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {LEDGER_COLUMNS} FROM credit_ledger WHERE user_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, CreditLedgerEntry>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
