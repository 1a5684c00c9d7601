//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every ledger failure is caught here and turned into a `success: false`
//! envelope; nothing is retried.

use crate::web::protocol::{
    ApiResponse, CountData, EventQuery, ExistsData, ExistsQuery, GrantData, GrantOdRequest,
    HealthData, HistoryQuery, OdEntryView, OdHistoryData, RosterRowView, SlotQuery,
    StudentInfoView,
};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use od_ledger_core::domain::{GrantOutcome, NewOdEntry, OdRosterRow};
use od_ledger_core::filters::OdFilter;
use od_ledger_core::ledger::LedgerError;
use od_ledger_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        grant_od_handler,
        student_history_handler,
        od_exists_handler,
        od_count_handler,
        event_roster_handler,
        slot_roster_handler,
        health_handler,
    ),
    components(
        schemas(
            GrantOdRequest,
            GrantData,
            OdHistoryData,
            OdEntryView,
            StudentInfoView,
            ExistsData,
            CountData,
            RosterRowView,
            HealthData,
        )
    ),
    tags(
        (name = "OD Ledger API", description = "Grant and look up On-Duty leave records.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Helpers
//=========================================================================================

fn respond<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    respond::<()>(status, ApiResponse::failed(message))
}

/// Maps a ledger failure onto a status code and the message shown to the user.
fn ledger_failure(context: &str, e: LedgerError) -> Response {
    let status = match &e {
        LedgerError::StudentNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LedgerError::ReadFailure(PortError::Unavailable(_))
        | LedgerError::WriteFailure(PortError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::ReadFailure(_)
        | LedgerError::WriteFailure(_)
        | LedgerError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("{}: {:?}", context, e);
    } else {
        warn!("{}: {}", context, e);
    }
    reject(status, format!("Error: {}", e))
}

fn parse_date(value: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Invalid date '{}': expected YYYY-MM-DD", value),
        )
    })
}

/// Answers a body or query string axum could not deserialize.
fn malformed(rejection: impl std::fmt::Display) -> Response {
    reject(
        StatusCode::BAD_REQUEST,
        format!("Invalid request: {}", rejection),
    )
}

fn parse_slot(value: i64) -> Result<u32, Response> {
    u32::try_from(value)
        .ok()
        .filter(|slot| *slot > 0)
        .ok_or_else(|| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Invalid slot {}: must be a positive integer", value),
            )
        })
}

/// An absent, blank or zero slot filter matches every slot.
fn parse_slot_filter(value: Option<&str>) -> Result<Option<u32>, Response> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    value
        .parse::<u32>()
        .map(|slot| Some(slot).filter(|slot| *slot > 0))
        .map_err(|_| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Invalid slot filter '{}': expected a number", value),
            )
        })
}

fn roster_response(rows: Vec<OdRosterRow>, message: String) -> Response {
    let rows: Vec<RosterRowView> = rows.into_iter().map(RosterRowView::from).collect();
    respond(StatusCode::OK, ApiResponse::ok(message, rows))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Grant an OD for one student, date and slot.
///
/// By default the duplicate check runs first and a grant for an already
/// recorded date and slot is rejected with 409. With `guard: false` the entry
/// is written unconditionally.
#[utoipa::path(
    post,
    path = "/ods",
    request_body = GrantOdRequest,
    responses(
        (status = 201, description = "OD recorded", body = GrantData),
        (status = 400, description = "Invalid roll number, date or slot"),
        (status = 404, description = "Student not in directory"),
        (status = 409, description = "OD already exists for this date and slot", body = OdEntryView),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn grant_od_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<GrantOdRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed(rejection),
    };
    let roll_number = req.roll_number.trim().to_string();
    if !app_state.config.roll_number_pattern.is_match(&roll_number) {
        return reject(StatusCode::BAD_REQUEST, "Invalid roll number format");
    }
    let date = match parse_date(&req.date) {
        Ok(date) => date,
        Err(response) => return response,
    };
    let slot = match parse_slot(req.slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };

    let request = NewOdEntry {
        roll_number: roll_number.clone(),
        date,
        slot,
        granted_by_id: req.granted_by_id,
        granted_by_name: req.granted_by_name,
        event_name: req.event_name,
    };

    let ledger = &app_state.ledger;
    let result = if req.guard.unwrap_or(true) {
        ledger.grant_od(request).await
    } else {
        info!("Unguarded OD write for {} on {} slot {}", roll_number, date, slot);
        ledger.add_od_entry(request).await.map(GrantOutcome::Granted)
    };

    match result {
        Ok(GrantOutcome::Granted(outcome)) => {
            let message = outcome.message.clone();
            respond(StatusCode::CREATED, ApiResponse::ok(message, GrantData::from(outcome)))
        }
        Ok(GrantOutcome::Duplicate(existing)) => respond(
            StatusCode::CONFLICT,
            ApiResponse {
                success: false,
                message: format!(
                    "OD already exists for {} on {} slot {}",
                    roll_number, date, slot
                ),
                data: Some(OdEntryView::from(existing)),
            },
        ),
        Err(e) => ledger_failure("Failed to add OD entry", e),
    }
}

/// Fetch a student's OD history, most recent first.
///
/// `date`, `slot` and `department` narrow the returned entries; the counts
/// report both the filtered and the original number of entries.
#[utoipa::path(
    get,
    path = "/ods/{roll_number}",
    params(
        ("roll_number" = String, Path, description = "The student's roll number."),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "History found", body = OdHistoryData),
        (status = 400, description = "Invalid filter"),
        (status = 404, description = "No OD entries for this student")
    )
)]
pub async fn student_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return malformed(rejection),
    };
    let date = match query.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(value) => match parse_date(value) {
            Ok(date) => Some(date),
            Err(response) => return response,
        },
        None => None,
    };
    let slot = match parse_slot_filter(query.slot.as_deref()) {
        Ok(slot) => slot,
        Err(response) => return response,
    };
    let filter = OdFilter {
        date,
        slot,
        department: query.department.filter(|d| !d.trim().is_empty()),
    };

    let history = match app_state.ledger.od_entries_for_student(roll_number.trim()).await {
        Ok(Some(history)) => history,
        Ok(None) => {
            return reject(StatusCode::NOT_FOUND, "No OD entries found for this student")
        }
        Err(e) => return ledger_failure("Failed to fetch OD entries", e),
    };

    let filtered = filter.apply(history);
    let message = if filter.is_empty() {
        format!("Found {} OD entries", filtered.original_count)
    } else {
        filtered.summary()
    };

    let data = OdHistoryData {
        filtered_count: filtered.filtered_count(),
        original_count: filtered.original_count,
        student_info: StudentInfoView::from(filtered.student),
        entries: filtered.entries.into_iter().map(OdEntryView::from).collect(),
    };
    respond(StatusCode::OK, ApiResponse::ok(message, data))
}

/// Check whether a student already has an OD for a date and slot.
#[utoipa::path(
    get,
    path = "/ods/{roll_number}/exists",
    params(
        ("roll_number" = String, Path, description = "The student's roll number."),
        ExistsQuery
    ),
    responses(
        (status = 200, description = "Check completed", body = ExistsData),
        (status = 400, description = "Invalid date or slot")
    )
)]
pub async fn od_exists_handler(
    State(app_state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
    query: Result<Query<ExistsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return malformed(rejection),
    };
    let date = match parse_date(&query.date) {
        Ok(date) => date,
        Err(response) => return response,
    };
    let slot = match parse_slot(query.slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };

    match app_state
        .ledger
        .check_od_exists(roll_number.trim(), date, slot)
        .await
    {
        Ok(check) => {
            let message = if check.exists {
                format!("OD already exists for slot {}", slot)
            } else {
                format!("No OD recorded for slot {}", slot)
            };
            let data = ExistsData {
                exists: check.exists,
                entry: check.entry.map(OdEntryView::from),
            };
            respond(StatusCode::OK, ApiResponse::ok(message, data))
        }
        Err(e) => ledger_failure("Failed to check OD existence", e),
    }
}

/// Count a student's OD entries. Zero when the student has none.
#[utoipa::path(
    get,
    path = "/ods/{roll_number}/count",
    params(("roll_number" = String, Path, description = "The student's roll number.")),
    responses((status = 200, description = "Count computed", body = CountData))
)]
pub async fn od_count_handler(
    State(app_state): State<Arc<AppState>>,
    Path(roll_number): Path<String>,
) -> Response {
    let roll_number = roll_number.trim().to_string();
    match app_state.ledger.od_count_for_student(&roll_number).await {
        Ok(count) => respond(
            StatusCode::OK,
            ApiResponse::ok(
                format!("{} OD entries", count),
                CountData { roll_number, count },
            ),
        ),
        Err(e) => ledger_failure("Failed to count OD entries", e),
    }
}

/// List every OD granted for an event on a date, ordered by department then roll number.
#[utoipa::path(
    get,
    path = "/ods/events",
    params(EventQuery),
    responses(
        (status = 200, description = "Matching entries", body = [RosterRowView]),
        (status = 400, description = "Invalid date")
    )
)]
pub async fn event_roster_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return malformed(rejection),
    };
    let date = match parse_date(&query.date) {
        Ok(date) => date,
        Err(response) => return response,
    };

    match app_state
        .ledger
        .od_entries_by_event_and_date(&query.event_name, date)
        .await
    {
        Ok(rows) => {
            let message = format!(
                "Found {} OD entries for {} on {}",
                rows.len(),
                query.event_name,
                date
            );
            roster_response(rows, message)
        }
        Err(e) => ledger_failure("Failed to fetch OD entries by event and date", e),
    }
}

/// List every OD on a date, optionally for one slot and one department.
#[utoipa::path(
    get,
    path = "/ods/slots",
    params(SlotQuery),
    responses(
        (status = 200, description = "Matching entries", body = [RosterRowView]),
        (status = 400, description = "Invalid date")
    )
)]
pub async fn slot_roster_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<SlotQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return malformed(rejection),
    };
    let date = match parse_date(&query.date) {
        Ok(date) => date,
        Err(response) => return response,
    };
    let slot = match parse_slot_filter(query.slot.as_deref()) {
        Ok(slot) => slot,
        Err(response) => return response,
    };
    let department = query.department.as_deref().filter(|d| !d.trim().is_empty());

    match app_state
        .ledger
        .od_entries_for_date_and_slot(date, slot, department)
        .await
    {
        Ok(rows) => {
            let message = format!("Found {} OD entries on {}", rows.len(), date);
            roster_response(rows, message)
        }
        Err(e) => ledger_failure("Failed to fetch OD entries by date and slot", e),
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthData))
)]
pub async fn health_handler() -> Response {
    respond(
        StatusCode::OK,
        ApiResponse::ok(
            "ok",
            HealthData {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        ),
    )
}
