//! Domain-specific error types for the ledger engine.
//! Separates validation, state-machine, and lookup failures instead of
//! mixing them with database errors.

/// Caller-supplied input that fails validation before any work is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Raid name must not be blank")]
    BlankRaidName,
    #[error("Character name must not be blank")]
    BlankCharacterName,
    #[error("Event name must not be blank")]
    BlankEventName,
    #[error("Reorder must supply exactly the event's current call ids")]
    ReorderSetMismatch,
}

/// Mutation attempted against an event whose status forbids it.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Event {event_id} is closed: {action} is not allowed")]
    EventClosed {
        event_id: i64,
        action: &'static str,
    },
    #[error("Event {0} is already closed")]
    AlreadyClosed(i64),
    #[error("Event {0} is already active")]
    AlreadyActive(i64),
}

/// Referenced entity does not exist (or is unusable for the operation).
#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    #[error("Event {0} not found")]
    Event(i64),
    #[error("Call {0} not found")]
    Call(i64),
    #[error("Account {0} not found")]
    Account(i64),
    #[error("Character '{0}' not found")]
    Character(String),
    #[error("Character '{0}' is not registered to an account")]
    UnregisteredCharacter(String),
    #[error("No attendance record for character '{character_name}' on call {call_id}")]
    Attendance {
        call_id: i64,
        character_name: String,
    },
}

/// Unified error type for lifecycle operations. Reconciliation rejects are
/// deliberately absent: they are reported as data in the `rejected` list of a
/// create-call response, never raised through this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("Character '{character_name}' is already linked to call {call_id}")]
    Conflict {
        call_id: i64,
        character_name: String,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
