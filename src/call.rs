//! Raid call lifecycle: create, edit, delete, manual add/remove, reorder.
//!
//! Every operation runs as one sqlx transaction. The call/attendance writes
//! and every ledger delta commit or roll back together, which is what keeps
//! each account's earned DKP equal to the sum of its linked attendance
//! modifiers even when an operation fails partway through.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::attendance::{self, RecordedAttendance, RejectedSighting};
use crate::census;
use crate::error::{EngineError, NotFoundError, ValidationError};
use crate::event;
use crate::ledger;
use crate::wholog;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RaidCall {
    pub id: i64,
    pub event_id: i64,
    pub raid_name: String,
    pub modifier: i64,
    /// The pasted who log, retained verbatim for audit.
    #[serde(skip_serializing)]
    pub raw_log: String,
    pub sort_order: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CallOutcome {
    pub call: RaidCall,
    pub recorded: Vec<RecordedAttendance>,
    pub rejected: Vec<RejectedSighting>,
}

#[derive(Debug, Serialize)]
pub struct EditedCall {
    pub raid_name: String,
    pub modifier: i64,
}

#[derive(Debug, Serialize)]
pub struct AddedCharacter {
    pub character_name: String,
    pub account_id: i64,
}

/// Parses the who log, reconciles attendance, and persists the call with a
/// sort order one past the event's current maximum. Rejected sightings are a
/// normal outcome returned to the caller, not an error.
pub(crate) async fn create_call(
    pool: &SqlitePool,
    event_id: i64,
    raid_name: &str,
    modifier: i64,
    who_log: &str,
    created_by: &str,
) -> Result<CallOutcome, EngineError> {
    let raid_name = raid_name.trim();
    if raid_name.is_empty() {
        return Err(ValidationError::BlankRaidName.into());
    }

    let sightings = wholog::parse_who_log(who_log);

    let mut tx = pool.begin().await?;
    let raid_event = event::fetch_event(&mut tx, event_id).await?;
    raid_event.require_active("creating a call")?;

    let (sort_order,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM raid_calls WHERE event_id = ?1",
    )
    .bind(event_id)
    .fetch_one(tx.as_mut())
    .await?;

    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO raid_calls
            (event_id, raid_name, modifier, raw_log, sort_order, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(event_id)
    .bind(raid_name)
    .bind(modifier)
    .bind(who_log)
    .bind(sort_order)
    .bind(created_by)
    .bind(created_at)
    .execute(tx.as_mut())
    .await?;
    let call_id = result.last_insert_rowid();

    let reconciliation =
        attendance::reconcile(&mut tx, call_id, raid_name, modifier, &sightings).await?;
    tx.commit().await?;

    info!(
        call_id,
        event_id,
        recorded = reconciliation.recorded.len(),
        rejected = reconciliation.rejected.len(),
        "created raid call"
    );

    Ok(CallOutcome {
        call: RaidCall {
            id: call_id,
            event_id,
            raid_name: raid_name.to_string(),
            modifier,
            raw_log: who_log.to_string(),
            sort_order,
            created_by: created_by.to_string(),
            created_at,
        },
        recorded: reconciliation.recorded,
        rejected: reconciliation.rejected,
    })
}

/// Renames a call and/or changes its modifier. A modifier change applies the
/// difference once per distinct linked account (the one-credit-per-account
/// invariant makes per-account and per-record equivalent here, but distinct
/// accounts is the contract). Attendance snapshots are rewritten to the new
/// values; the call row is updated last.
///
/// Edits are rejected on closed events, the same as every other mutation.
pub(crate) async fn edit_call(
    pool: &SqlitePool,
    event_id: i64,
    call_id: i64,
    raid_name: Option<&str>,
    modifier: Option<i64>,
) -> Result<EditedCall, EngineError> {
    let new_name = match raid_name {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::BlankRaidName.into());
            }
            Some(name.to_string())
        }
        None => None,
    };

    let mut tx = pool.begin().await?;
    let raid_event = event::fetch_event(&mut tx, event_id).await?;
    raid_event.require_active("editing a call")?;
    let call = fetch_call(&mut tx, event_id, call_id).await?;

    let new_name = new_name.unwrap_or_else(|| call.raid_name.clone());
    let new_modifier = modifier.unwrap_or(call.modifier);

    let delta = new_modifier - call.modifier;
    if delta != 0 {
        for account_id in attendance::distinct_accounts(&mut tx, call_id).await? {
            ledger::apply_delta(&mut tx, account_id, delta).await?;
        }
    }

    attendance::update_snapshots(&mut tx, call_id, &new_name, new_modifier).await?;

    sqlx::query("UPDATE raid_calls SET raid_name = ?1, modifier = ?2 WHERE id = ?3")
        .bind(&new_name)
        .bind(new_modifier)
        .bind(call_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(call_id, event_id, delta, "edited raid call");

    Ok(EditedCall {
        raid_name: new_name,
        modifier: new_modifier,
    })
}

/// Reverses the call's modifier for every distinct linked account, then
/// removes the attendance rows and the call itself.
pub(crate) async fn delete_call(
    pool: &SqlitePool,
    event_id: i64,
    call_id: i64,
) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;
    let raid_event = event::fetch_event(&mut tx, event_id).await?;
    raid_event.require_active("deleting a call")?;
    let call = fetch_call(&mut tx, event_id, call_id).await?;

    for account_id in attendance::distinct_accounts(&mut tx, call_id).await? {
        ledger::apply_delta(&mut tx, account_id, -call.modifier).await?;
    }

    let removed = attendance::delete_for_call(&mut tx, call_id).await?;
    sqlx::query("DELETE FROM raid_calls WHERE id = ?1")
        .bind(call_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(call_id, event_id, removed, "deleted raid call");
    Ok(())
}

/// Manual officer action: the single-row case of the create-call
/// reconciliation. Unknown or unregistered characters are lookup failures
/// here (unlike the reconciler, which collects them as rejects); an account
/// already linked to the call is a conflict.
pub(crate) async fn add_character_to_call(
    pool: &SqlitePool,
    event_id: i64,
    call_id: i64,
    character_name: &str,
) -> Result<AddedCharacter, EngineError> {
    let character_name = character_name.trim();
    if character_name.is_empty() {
        return Err(ValidationError::BlankCharacterName.into());
    }

    let mut tx = pool.begin().await?;
    let raid_event = event::fetch_event(&mut tx, event_id).await?;
    raid_event.require_active("adding a character")?;
    let call = fetch_call(&mut tx, event_id, call_id).await?;

    let character = census::find_by_name(&mut tx, character_name)
        .await?
        .ok_or_else(|| NotFoundError::Character(character_name.to_string()))?;
    let account_id = character
        .account_id
        .ok_or_else(|| NotFoundError::UnregisteredCharacter(character_name.to_string()))?;

    if attendance::is_account_linked(&mut tx, call_id, account_id).await? {
        return Err(EngineError::Conflict {
            call_id,
            character_name: character_name.to_string(),
        });
    }

    attendance::record_attendance(
        &mut tx,
        call_id,
        &call.raid_name,
        call.modifier,
        account_id,
        &character.name,
        Utc::now(),
    )
    .await?;
    tx.commit().await?;

    info!(call_id, account_id, character_name, "added character to call");

    Ok(AddedCharacter {
        character_name: character.name,
        account_id,
    })
}

/// Reverses and removes one account's credit, located by the call's
/// character-name snapshot.
pub(crate) async fn remove_character_from_call(
    pool: &SqlitePool,
    event_id: i64,
    call_id: i64,
    character_name: &str,
) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;
    let raid_event = event::fetch_event(&mut tx, event_id).await?;
    raid_event.require_active("removing a character")?;
    let call = fetch_call(&mut tx, event_id, call_id).await?;

    let record = attendance::find_for_character(&mut tx, call_id, character_name)
        .await?
        .ok_or_else(|| NotFoundError::Attendance {
            call_id,
            character_name: character_name.to_string(),
        })?;

    ledger::apply_delta(&mut tx, record.account_id, -call.modifier).await?;
    attendance::delete_record(&mut tx, record.id).await?;
    tx.commit().await?;

    info!(
        call_id,
        account_id = record.account_id,
        character_name,
        "removed character from call"
    );
    Ok(())
}

/// Assigns `sort_order = index + 1` following the supplied permutation.
/// The id set must match the event's current calls exactly: no partial
/// reorders, no foreign ids, no duplicates. Pure metadata, no ledger
/// interaction, and permitted on closed events.
pub(crate) async fn reorder_calls(
    pool: &SqlitePool,
    event_id: i64,
    call_ids: &[i64],
) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;
    event::fetch_event(&mut tx, event_id).await?;

    let current: Vec<(i64,)> = sqlx::query_as("SELECT id FROM raid_calls WHERE event_id = ?1")
        .bind(event_id)
        .fetch_all(tx.as_mut())
        .await?;
    let current: HashSet<i64> = current.into_iter().map(|(id,)| id).collect();
    let supplied: HashSet<i64> = call_ids.iter().copied().collect();

    if supplied != current || call_ids.len() != current.len() {
        return Err(ValidationError::ReorderSetMismatch.into());
    }

    for (index, call_id) in call_ids.iter().enumerate() {
        sqlx::query("UPDATE raid_calls SET sort_order = ?1 WHERE id = ?2 AND event_id = ?3")
            .bind(index as i64 + 1)
            .bind(call_id)
            .bind(event_id)
            .execute(tx.as_mut())
            .await?;
    }
    tx.commit().await?;

    info!(event_id, calls = call_ids.len(), "reordered raid calls");
    Ok(())
}

/// Loads a call scoped to its event so a call id from another event reads as
/// not-found rather than leaking across events.
pub(crate) async fn fetch_call(
    tx: &mut Transaction<'_, Sqlite>,
    event_id: i64,
    call_id: i64,
) -> Result<RaidCall, EngineError> {
    sqlx::query_as::<_, RaidCall>(
        "SELECT id, event_id, raid_name, modifier, raw_log, sort_order, created_by, created_at
         FROM raid_calls
         WHERE id = ?1 AND event_id = ?2",
    )
    .bind(call_id)
    .bind(event_id)
    .fetch_optional(tx.as_mut())
    .await?
    .ok_or_else(|| NotFoundError::Call(call_id).into())
}
