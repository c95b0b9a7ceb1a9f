//! Read-only view of the character directory.
//!
//! The `characters` table is owned by the roster subsystem; the ledger engine
//! only reads it to resolve a sighted character name to its owning account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CharacterStatus {
    Main,
    Alt,
    Bot,
    Dropped,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Character {
    pub name: String,
    /// Owning account, if the character has been claimed. Unclaimed
    /// characters are rejected by the reconciler as "Not registered".
    pub account_id: Option<i64>,
    pub class: Option<String>,
    pub level: Option<i64>,
    pub status: CharacterStatus,
    pub last_modified: DateTime<Utc>,
}

/// Looks up a character by its unique name within the caller's transaction,
/// so reconciliation sees a consistent directory snapshot.
pub(crate) async fn find_by_name(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
) -> Result<Option<Character>, sqlx::Error> {
    sqlx::query_as::<_, Character>(
        "SELECT name, account_id, class, level, status, last_modified
         FROM characters
         WHERE name = ?1",
    )
    .bind(name)
    .fetch_optional(tx.as_mut())
    .await
}
