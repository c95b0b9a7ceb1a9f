//! Attendance reconciliation: turns parsed sightings into durable attendance
//! records and ledger credits, deduplicated per account.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::census;
use crate::error::EngineError;
use crate::ledger;
use crate::wholog::Sighting;

#[derive(Debug, Clone, Serialize)]
pub struct RecordedAttendance {
    pub account_id: i64,
    pub character_name: String,
    pub attendance_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedSighting {
    pub name: String,
    pub reason: RejectReason,
}

/// Per-sighting rejection reasons. These are expected outcomes reported back
/// to the caller, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    #[serde(rename = "Not registered")]
    NotRegistered,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "Not registered"),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Reconciliation {
    pub recorded: Vec<RecordedAttendance>,
    pub rejected: Vec<RejectedSighting>,
}

/// Classifies each sighting as recorded or rejected, in input order.
///
/// A character that resolves to no account (or to no character at all) is
/// rejected. An account that already earned credit earlier in this call is
/// skipped silently: first sighting in log order wins, and a call credits
/// each account at most once no matter how many of its characters appear.
///
/// Runs entirely inside the caller's transaction; an empty sighting list
/// returns empty result lists without touching the ledger.
pub(crate) async fn reconcile(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
    raid_name: &str,
    modifier: i64,
    sightings: &[Sighting],
) -> Result<Reconciliation, EngineError> {
    let mut reconciliation = Reconciliation::default();
    let mut seen_accounts: HashSet<i64> = HashSet::new();

    for sighting in sightings {
        let character = match census::find_by_name(tx, &sighting.name).await? {
            Some(character) if character.account_id.is_some() => character,
            _ => {
                reconciliation.rejected.push(RejectedSighting {
                    name: sighting.name.clone(),
                    reason: RejectReason::NotRegistered,
                });
                continue;
            }
        };

        let account_id = character.account_id.unwrap_or_default();
        if !seen_accounts.insert(account_id) {
            debug!(
                account_id,
                character = %character.name,
                "account already credited for this call, skipping"
            );
            continue;
        }

        let attendance_id = record_attendance(
            tx,
            call_id,
            raid_name,
            modifier,
            account_id,
            &character.name,
            sighting.timestamp,
        )
        .await?;

        reconciliation.recorded.push(RecordedAttendance {
            account_id,
            character_name: character.name,
            attendance_id,
        });
    }

    Ok(reconciliation)
}

/// The single-account case of the reconciliation contract: one snapshot row
/// plus one `+modifier` ledger delta, atomic with the caller's transaction.
/// Used by `reconcile` per sighting and by the manual add-character path.
pub(crate) async fn record_attendance(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
    raid_name: &str,
    modifier: i64,
    account_id: i64,
    character_name: &str,
    recorded_at: DateTime<Utc>,
) -> Result<i64, EngineError> {
    let result = sqlx::query(
        "INSERT INTO attendance_records
            (call_id, account_id, recorded_at, raid_name, character_name, modifier)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(call_id)
    .bind(account_id)
    .bind(recorded_at)
    .bind(raid_name)
    .bind(character_name)
    .bind(modifier)
    .execute(tx.as_mut())
    .await?;

    ledger::apply_delta(tx, account_id, modifier).await?;

    Ok(result.last_insert_rowid())
}

/// Distinct accounts currently linked to a call. The unique
/// `(call_id, account_id)` index guarantees at most one row per account, so
/// edit/delete deltas apply exactly once per account.
pub(crate) async fn distinct_accounts(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT account_id FROM attendance_records WHERE call_id = ?1 ORDER BY account_id",
    )
    .bind(call_id)
    .fetch_all(tx.as_mut())
    .await?;

    Ok(rows.into_iter().map(|(account_id,)| account_id).collect())
}

pub(crate) async fn is_account_linked(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
    account_id: i64,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM attendance_records WHERE call_id = ?1 AND account_id = ?2",
    )
    .bind(call_id)
    .bind(account_id)
    .fetch_optional(tx.as_mut())
    .await?;

    Ok(row.is_some())
}

/// Attendance row located for a manual remove, by character-name snapshot.
pub(crate) struct LinkedRecord {
    pub(crate) id: i64,
    pub(crate) account_id: i64,
}

pub(crate) async fn find_for_character(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
    character_name: &str,
) -> Result<Option<LinkedRecord>, sqlx::Error> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT id, account_id FROM attendance_records
         WHERE call_id = ?1 AND character_name = ?2",
    )
    .bind(call_id)
    .bind(character_name)
    .fetch_optional(tx.as_mut())
    .await?;

    Ok(row.map(|(id, account_id)| LinkedRecord { id, account_id }))
}

pub(crate) async fn delete_record(
    tx: &mut Transaction<'_, Sqlite>,
    attendance_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM attendance_records WHERE id = ?1")
        .bind(attendance_id)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

pub(crate) async fn delete_for_call(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM attendance_records WHERE call_id = ?1")
        .bind(call_id)
        .execute(tx.as_mut())
        .await?;
    Ok(result.rows_affected())
}

/// Rewrites the raid-name and modifier snapshots of every record linked to a
/// call. Snapshots are immutable across the passage of time but not across an
/// explicit call edit.
pub(crate) async fn update_snapshots(
    tx: &mut Transaction<'_, Sqlite>,
    call_id: i64,
    raid_name: &str,
    modifier: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE attendance_records SET raid_name = ?1, modifier = ?2 WHERE call_id = ?3",
    )
    .bind(raid_name)
    .bind(modifier)
    .bind(call_id)
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
