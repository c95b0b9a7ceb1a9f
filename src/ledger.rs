//! The DKP ledger: per-account earned/spent totals.
//!
//! `apply_delta` is a pure accumulator. Correctness never depends on reading
//! the current balance first, so deltas to different accounts commute;
//! same-account deltas are serialized by SQLite's single-writer discipline.
//! Reversal is simply applying the negated delta.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{EngineError, NotFoundError};

/// Adds `delta` (which may be negative) to an account's earned DKP, inside
/// the caller's transaction so it commits or rolls back with the attendance
/// rows it accompanies.
pub(crate) async fn apply_delta(
    tx: &mut Transaction<'_, Sqlite>,
    account_id: i64,
    delta: i64,
) -> Result<(), EngineError> {
    let result = sqlx::query("UPDATE accounts SET earned_dkp = earned_dkp + ?1 WHERE id = ?2")
        .bind(delta)
        .bind(account_id)
        .execute(tx.as_mut())
        .await?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::Account(account_id).into());
    }

    debug!(account_id, delta, "applied ledger delta");
    Ok(())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Balance {
    pub account_id: i64,
    pub name: String,
    pub earned_dkp: i64,
    pub spent_dkp: i64,
    pub current_dkp: i64,
}

pub(crate) async fn fetch_balance(
    pool: &SqlitePool,
    account_id: i64,
) -> Result<Balance, EngineError> {
    sqlx::query_as::<_, Balance>(
        "SELECT id AS account_id, name, earned_dkp, spent_dkp,
                earned_dkp - spent_dkp AS current_dkp
         FROM accounts
         WHERE id = ?1",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| NotFoundError::Account(account_id).into())
}
