//! # API REST
//!
//! REST surface for the shared call list.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialisation, CORS, status mapping)
//!
//! The worklist semantics live entirely in `calllist-core`; this crate
//! validates and translates at the boundary, checks line access, and formats
//! fields for display.

#![warn(rust_2018_idioms)]

pub mod access;
pub mod display;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use access::LineAccess;
use calllist_core::{CallListError, CallListService, CallRecord, PatientSummary, WorklistEntry};
use calllist_types::{CallOutcome, Line, NonEmptyText};
use display::format_phone;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CallListService>,
    pub access: Arc<dyn LineAccess>,
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCallListReq {
    pub patient_id: String,
    pub actor: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorklistEntryRes {
    pub patient_id: String,
    pub line: String,
    pub added_at: String,
    pub added_by: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordOutcomeReq {
    pub patient_id: String,
    pub actor: String,
    /// One of `reached`, `voicemail`, `not_reached`.
    pub outcome: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CallRecordRes {
    pub patient_id: String,
    pub line: String,
    pub called_at: String,
    pub called_by: String,
    pub outcome: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PatientSummaryRes {
    pub patient_id: String,
    pub name: String,
    pub line: String,
    pub primary_phone: Option<String>,
    pub primary_phone_display: Option<String>,
    pub added_at: Option<String>,
    pub added_by: Option<String>,
    pub last_called_at: Option<String>,
    pub last_called_by: Option<String>,
    pub last_outcome: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CallListRes {
    pub line: String,
    pub patients: Vec<PatientSummaryRes>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    /// Staff member issuing the query; consulted by the line access check.
    pub viewer: Option<String>,
}

impl From<WorklistEntry> for WorklistEntryRes {
    fn from(entry: WorklistEntry) -> Self {
        Self {
            patient_id: entry.patient_id.to_string(),
            line: entry.line.to_string(),
            added_at: entry.added_at.to_rfc3339(),
            added_by: entry.added_by.to_string(),
        }
    }
}

impl From<CallRecord> for CallRecordRes {
    fn from(record: CallRecord) -> Self {
        Self {
            patient_id: record.patient_id.to_string(),
            line: record.line.to_string(),
            called_at: record.called_at.to_rfc3339(),
            called_by: record.called_by.to_string(),
            outcome: record.outcome.to_string(),
        }
    }
}

impl From<PatientSummary> for PatientSummaryRes {
    fn from(summary: PatientSummary) -> Self {
        Self {
            patient_id: summary.patient_id.to_string(),
            name: summary.name.to_string(),
            line: summary.line.to_string(),
            primary_phone_display: summary.primary_phone.as_deref().map(format_phone),
            primary_phone: summary.primary_phone,
            added_at: summary.added_at.map(|at| at.to_rfc3339()),
            added_by: summary.added_by.map(|by| by.to_string()),
            last_called_at: summary.last_called_at.map(|at| at.to_rfc3339()),
            last_called_by: summary.last_called_by.map(|by| by.to_string()),
            last_outcome: summary.last_outcome.map(|o| o.to_string()),
        }
    }
}

// ============================================================================
// BOUNDARY VALIDATION
// ============================================================================

type ApiError = (StatusCode, String);

fn parse_line(raw: &str) -> Result<Line, ApiError> {
    Line::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid line: {e}")))
}

fn parse_patient_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid patient id: '{raw}'")))
}

fn parse_actor(raw: &str) -> Result<NonEmptyText, ApiError> {
    NonEmptyText::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid actor: {e}")))
}

fn parse_outcome(raw: &str) -> Result<CallOutcome, ApiError> {
    raw.parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid outcome: {e}")))
}

fn check_access(state: &AppState, user: &str, line: &Line) -> Result<(), ApiError> {
    if state.access.allowed_lines(user).allows(line) {
        return Ok(());
    }
    tracing::warn!(user = %user, line = %line, "line access denied");
    // Deliberately indistinguishable from an unknown line.
    Err((
        StatusCode::NOT_FOUND,
        "no call list is available here".into(),
    ))
}

fn map_core_error(err: CallListError) -> ApiError {
    match err {
        // The protective boundary: never reveal that the patient exists on
        // another line.
        CallListError::NotFound(_) | CallListError::LineMismatch { .. } => (
            StatusCode::NOT_FOUND,
            "cannot act on this patient here".into(),
        ),
        CallListError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        CallListError::Conflict => (StatusCode::CONFLICT, err.to_string()),
        CallListError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        active_worklist,
        completed_calls,
        add_to_call_list,
        remove_from_call_list,
        record_outcome,
    ),
    components(schemas(
        HealthRes,
        AddToCallListReq,
        WorklistEntryRes,
        RecordOutcomeReq,
        CallRecordRes,
        PatientSummaryRes,
        CallListRes,
    ))
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "call list is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/lines/{line}/call-list",
    params(
        ("line" = String, Path, description = "Line the worklist is scoped to"),
        ("viewer" = Option<String>, Query, description = "Staff member issuing the query")
    ),
    responses(
        (status = 200, description = "Patients who currently need a call", body = CallListRes),
        (status = 404, description = "Line not visible to this viewer")
    )
)]
/// The shared active worklist for a line, most recently added first.
///
/// Membership is re-derived at the moment of this request: completed calls
/// whose grace window has elapsed reappear here with no explicit action.
#[axum::debug_handler]
async fn active_worklist(
    State(state): State<AppState>,
    AxumPath(line): AxumPath<String>,
    Query(params): Query<ViewerParams>,
) -> Result<Json<CallListRes>, ApiError> {
    let line = parse_line(&line)?;
    check_access(&state, params.viewer.as_deref().unwrap_or(""), &line)?;

    let patients = state
        .service
        .active_worklist(&line)
        .map_err(map_core_error)?;

    Ok(Json(CallListRes {
        line: line.to_string(),
        patients: patients.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/lines/{line}/completed-calls",
    params(
        ("line" = String, Path, description = "Line the worklist is scoped to"),
        ("viewer" = Option<String>, Query, description = "Staff member issuing the query")
    ),
    responses(
        (status = 200, description = "Recently completed calls", body = CallListRes),
        (status = 404, description = "Line not visible to this viewer")
    )
)]
/// Completed calls still inside the grace window, most recently called first.
#[axum::debug_handler]
async fn completed_calls(
    State(state): State<AppState>,
    AxumPath(line): AxumPath<String>,
    Query(params): Query<ViewerParams>,
) -> Result<Json<CallListRes>, ApiError> {
    let line = parse_line(&line)?;
    check_access(&state, params.viewer.as_deref().unwrap_or(""), &line)?;

    let patients = state
        .service
        .completed_calls(&line)
        .map_err(map_core_error)?;

    Ok(Json(CallListRes {
        line: line.to_string(),
        patients: patients.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/lines/{line}/call-list",
    params(
        ("line" = String, Path, description = "Line the worklist is scoped to")
    ),
    request_body = AddToCallListReq,
    responses(
        (status = 201, description = "Patient added (or already present)", body = WorklistEntryRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Cannot act on this patient here"),
        (status = 409, description = "Lost a concurrent race; retry")
    )
)]
/// Adds a patient to the shared worklist. Idempotent for active patients.
#[axum::debug_handler]
async fn add_to_call_list(
    State(state): State<AppState>,
    AxumPath(line): AxumPath<String>,
    Json(req): Json<AddToCallListReq>,
) -> Result<(StatusCode, Json<WorklistEntryRes>), ApiError> {
    let line = parse_line(&line)?;
    let patient_id = parse_patient_id(&req.patient_id)?;
    let actor = parse_actor(&req.actor)?;
    check_access(&state, actor.as_str(), &line)?;

    let entry = state
        .service
        .add_to_worklist(patient_id, &line, actor)
        .map_err(map_core_error)?;

    Ok((StatusCode::CREATED, Json(entry.into())))
}

#[utoipa::path(
    delete,
    path = "/lines/{line}/call-list/{patient_id}",
    params(
        ("line" = String, Path, description = "Line the worklist is scoped to"),
        ("patient_id" = String, Path, description = "Patient to remove")
    ),
    responses(
        (status = 204, description = "Removed (or was not present)"),
        (status = 400, description = "Bad request")
    )
)]
/// Removes a patient from the worklist for every viewer. Call history is
/// retained.
#[axum::debug_handler]
async fn remove_from_call_list(
    State(state): State<AppState>,
    AxumPath((line, patient_id)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let line = parse_line(&line)?;
    let patient_id = parse_patient_id(&patient_id)?;

    state
        .service
        .remove_from_worklist(patient_id, &line)
        .map_err(map_core_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/lines/{line}/calls",
    params(
        ("line" = String, Path, description = "Line the worklist is scoped to")
    ),
    request_body = RecordOutcomeReq,
    responses(
        (status = 201, description = "Outcome recorded", body = CallRecordRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Cannot act on this patient here")
    )
)]
/// Records a call attempt and its outcome, suppressing the patient from the
/// active worklist for the grace window.
#[axum::debug_handler]
async fn record_outcome(
    State(state): State<AppState>,
    AxumPath(line): AxumPath<String>,
    Json(req): Json<RecordOutcomeReq>,
) -> Result<(StatusCode, Json<CallRecordRes>), ApiError> {
    let line = parse_line(&line)?;
    let patient_id = parse_patient_id(&req.patient_id)?;
    let actor = parse_actor(&req.actor)?;
    let outcome = parse_outcome(&req.outcome)?;
    check_access(&state, actor.as_str(), &line)?;

    let record = state
        .service
        .record_outcome(patient_id, &line, actor, outcome)
        .map_err(map_core_error)?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Builds the REST router with CORS and the OpenAPI document route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/lines/:line/call-list", get(active_worklist))
        .route("/lines/:line/call-list", post(add_to_call_list))
        .route(
            "/lines/:line/call-list/:patient_id",
            delete(remove_from_call_list),
        )
        .route("/lines/:line/calls", post(record_outcome))
        .route("/lines/:line/completed-calls", get(completed_calls))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
