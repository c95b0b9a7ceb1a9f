use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::response::{self, Responder, status};
use rocket::serde::json::Json;
use rocket::{Request, Route, State, delete, get, patch, post, put, routes};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::error;

use crate::call::{self, AddedCharacter, CallOutcome, EditedCall};
use crate::error::EngineError;
use crate::event::{self, EventDetail, RaidEvent};
use crate::ledger::{self, Balance};

/// Maps the engine error taxonomy onto HTTP statuses. Reconciliation rejects
/// never pass through here; they ride in the 200 response body.
pub(crate) struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let http_status = match &self.0 {
            EngineError::Validation(_) => Status::BadRequest,
            EngineError::State(_) | EngineError::Conflict { .. } => Status::Conflict,
            EngineError::NotFound(_) => Status::NotFound,
            EngineError::Database(e) => {
                error!("database error while serving request: {e}");
                Status::InternalServerError
            }
        };

        status::Custom(
            http_status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
        .respond_to(request)
    }
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
}

#[get("/health")]
fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Deserialize)]
struct CreateEventRequest {
    name: String,
    created_by: String,
}

#[post("/events", format = "json", data = "<request>")]
async fn create_event(
    request: Json<CreateEventRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<RaidEvent>, ApiError> {
    let event = event::create_event(pool, &request.name, &request.created_by).await?;
    Ok(Json(event))
}

#[get("/events/<event_id>")]
async fn get_event(event_id: i64, pool: &State<SqlitePool>) -> Result<Json<EventDetail>, ApiError> {
    Ok(Json(event::fetch_event_detail(pool, event_id).await?))
}

#[post("/events/<event_id>/close")]
async fn close_event(event_id: i64, pool: &State<SqlitePool>) -> Result<Json<RaidEvent>, ApiError> {
    Ok(Json(event::close_event(pool, event_id).await?))
}

#[post("/events/<event_id>/reopen")]
async fn reopen_event(event_id: i64, pool: &State<SqlitePool>) -> Result<Json<RaidEvent>, ApiError> {
    Ok(Json(event::reopen_event(pool, event_id).await?))
}

#[derive(Deserialize)]
struct CreateCallRequest {
    raid_name: String,
    modifier: i64,
    who_log: String,
    created_by: String,
}

#[post("/events/<event_id>/calls", format = "json", data = "<request>")]
async fn create_call(
    event_id: i64,
    request: Json<CreateCallRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<CallOutcome>, ApiError> {
    let outcome = call::create_call(
        pool,
        event_id,
        &request.raid_name,
        request.modifier,
        &request.who_log,
        &request.created_by,
    )
    .await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct EditCallRequest {
    raid_name: Option<String>,
    modifier: Option<i64>,
}

#[patch("/events/<event_id>/calls/<call_id>", format = "json", data = "<request>")]
async fn edit_call(
    event_id: i64,
    call_id: i64,
    request: Json<EditCallRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<EditedCall>, ApiError> {
    let edited = call::edit_call(
        pool,
        event_id,
        call_id,
        request.raid_name.as_deref(),
        request.modifier,
    )
    .await?;
    Ok(Json(edited))
}

#[delete("/events/<event_id>/calls/<call_id>")]
async fn delete_call(
    event_id: i64,
    call_id: i64,
    pool: &State<SqlitePool>,
) -> Result<Json<OkResponse>, ApiError> {
    call::delete_call(pool, event_id, call_id).await?;
    Ok(OkResponse::ok())
}

#[derive(Deserialize)]
struct AddCharacterRequest {
    character_name: String,
}

#[post(
    "/events/<event_id>/calls/<call_id>/attendees",
    format = "json",
    data = "<request>"
)]
async fn add_character(
    event_id: i64,
    call_id: i64,
    request: Json<AddCharacterRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<AddedCharacter>, ApiError> {
    let added =
        call::add_character_to_call(pool, event_id, call_id, &request.character_name).await?;
    Ok(Json(added))
}

#[delete("/events/<event_id>/calls/<call_id>/attendees/<character_name>")]
async fn remove_character(
    event_id: i64,
    call_id: i64,
    character_name: &str,
    pool: &State<SqlitePool>,
) -> Result<Json<OkResponse>, ApiError> {
    call::remove_character_from_call(pool, event_id, call_id, character_name).await?;
    Ok(OkResponse::ok())
}

#[derive(Deserialize)]
struct ReorderRequest {
    call_ids: Vec<i64>,
}

#[put("/events/<event_id>/calls/order", format = "json", data = "<request>")]
async fn reorder_calls(
    event_id: i64,
    request: Json<ReorderRequest>,
    pool: &State<SqlitePool>,
) -> Result<Json<OkResponse>, ApiError> {
    call::reorder_calls(pool, event_id, &request.call_ids).await?;
    Ok(OkResponse::ok())
}

#[get("/accounts/<account_id>/balance")]
async fn get_balance(account_id: i64, pool: &State<SqlitePool>) -> Result<Json<Balance>, ApiError> {
    Ok(Json(ledger::fetch_balance(pool, account_id).await?))
}

pub fn routes() -> Vec<Route> {
    routes![
        health,
        create_event,
        get_event,
        close_event,
        reopen_event,
        create_call,
        edit_call,
        delete_call,
        add_character,
        remove_character,
        reorder_calls,
        get_balance,
    ]
}
