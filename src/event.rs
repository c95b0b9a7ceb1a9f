//! Raid events and their open/closed state machine.
//!
//! ```text
//! active --close--> closed --reopen--> active
//! ```
//!
//! Initial state is `active`; there is no terminal state, reopen is always
//! available. The status gates which call lifecycle operations are legal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::{EngineError, NotFoundError, StateError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RaidEvent {
    pub id: i64,
    pub name: String,
    pub status: EventStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RaidEvent {
    /// Gate for mutating lifecycle operations. `action` names the operation
    /// for the error message.
    pub(crate) fn require_active(&self, action: &'static str) -> Result<(), StateError> {
        match self.status {
            EventStatus::Active => Ok(()),
            EventStatus::Closed => Err(StateError::EventClosed {
                event_id: self.id,
                action,
            }),
        }
    }
}

pub(crate) async fn create_event(
    pool: &SqlitePool,
    name: &str,
    created_by: &str,
) -> Result<RaidEvent, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::BlankEventName.into());
    }

    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO raid_events (name, status, created_by, created_at)
         VALUES (?1, 'active', ?2, ?3)",
    )
    .bind(name)
    .bind(created_by)
    .bind(created_at)
    .execute(pool)
    .await?;

    let event_id = result.last_insert_rowid();
    info!(event_id, name, "created raid event");

    Ok(RaidEvent {
        id: event_id,
        name: name.to_string(),
        status: EventStatus::Active,
        created_by: created_by.to_string(),
        created_at,
        closed_at: None,
    })
}

/// Loads an event inside the caller's transaction so the status check and
/// the mutation it gates see the same row.
pub(crate) async fn fetch_event(
    tx: &mut Transaction<'_, Sqlite>,
    event_id: i64,
) -> Result<RaidEvent, EngineError> {
    sqlx::query_as::<_, RaidEvent>(
        "SELECT id, name, status, created_by, created_at, closed_at
         FROM raid_events
         WHERE id = ?1",
    )
    .bind(event_id)
    .fetch_optional(tx.as_mut())
    .await?
    .ok_or_else(|| NotFoundError::Event(event_id).into())
}

pub(crate) async fn close_event(pool: &SqlitePool, event_id: i64) -> Result<RaidEvent, EngineError> {
    let mut tx = pool.begin().await?;
    let mut event = fetch_event(&mut tx, event_id).await?;
    if event.status == EventStatus::Closed {
        return Err(StateError::AlreadyClosed(event_id).into());
    }

    let closed_at = Utc::now();
    sqlx::query("UPDATE raid_events SET status = 'closed', closed_at = ?1 WHERE id = ?2")
        .bind(closed_at)
        .bind(event_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(event_id, "closed raid event");
    event.status = EventStatus::Closed;
    event.closed_at = Some(closed_at);
    Ok(event)
}

pub(crate) async fn reopen_event(
    pool: &SqlitePool,
    event_id: i64,
) -> Result<RaidEvent, EngineError> {
    let mut tx = pool.begin().await?;
    let mut event = fetch_event(&mut tx, event_id).await?;
    if event.status == EventStatus::Active {
        return Err(StateError::AlreadyActive(event_id).into());
    }

    sqlx::query("UPDATE raid_events SET status = 'active', closed_at = NULL WHERE id = ?1")
        .bind(event_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(event_id, "reopened raid event");
    event.status = EventStatus::Active;
    event.closed_at = None;
    Ok(event)
}

/// Read-only event summary: the event plus its calls in sort order, each
/// with an attendee count.
#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: RaidEvent,
    pub calls: Vec<CallSummary>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CallSummary {
    pub id: i64,
    pub raid_name: String,
    pub modifier: i64,
    pub sort_order: i64,
    pub attendee_count: i64,
}

pub(crate) async fn fetch_event_detail(
    pool: &SqlitePool,
    event_id: i64,
) -> Result<EventDetail, EngineError> {
    let mut tx = pool.begin().await?;
    let event = fetch_event(&mut tx, event_id).await?;

    let calls = sqlx::query_as::<_, CallSummary>(
        "SELECT c.id, c.raid_name, c.modifier, c.sort_order,
                COUNT(a.id) AS attendee_count
         FROM raid_calls c
         LEFT JOIN attendance_records a ON a.call_id = c.id
         WHERE c.event_id = ?1
         GROUP BY c.id
         ORDER BY c.sort_order",
    )
    .bind(event_id)
    .fetch_all(tx.as_mut())
    .await?;
    tx.commit().await?;

    Ok(EventDetail { event, calls })
}
