//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the panels (admin, coordinator,
//! teacher) and the API server. Every response is wrapped in `ApiResponse`.

use chrono::{DateTime, NaiveDate, Utc};
use od_ledger_core::domain::{AddOdOutcome, KeyedOdEntry, OdRosterRow, StudentInfo};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The envelope every endpoint answers with. `message` is meant to be shown
/// to the user verbatim.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

//=========================================================================================
// Requests Sent FROM the Panels TO the Server
//=========================================================================================

/// Body of `POST /ods`.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrantOdRequest {
    pub roll_number: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub slot: i64,
    pub granted_by_id: Option<String>,
    pub granted_by_name: Option<String>,
    pub event_name: Option<String>,
    /// When `false`, skips the duplicate check and writes unconditionally.
    /// Defaults to `true`.
    pub guard: Option<bool>,
}

/// Optional narrowing of `GET /ods/{roll_number}`.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub date: Option<String>,
    /// Blank or `0` means every slot.
    pub slot: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExistsQuery {
    pub date: String,
    pub slot: i64,
}

#[derive(Deserialize, Debug, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    pub event_name: String,
    pub date: String,
}

#[derive(Deserialize, Debug, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SlotQuery {
    pub date: String,
    /// Blank or `0` means every slot.
    pub slot: Option<String>,
    pub department: Option<String>,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Panels
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfoView {
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub section: String,
}

impl From<StudentInfo> for StudentInfoView {
    fn from(info: StudentInfo) -> Self {
        Self {
            roll_number: info.roll_number,
            student_name: info.student_name,
            department: info.department,
            section: info.section,
        }
    }
}

/// One OD entry, annotated with the key it is stored under.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OdEntryView {
    pub timestamp: String,
    pub date: NaiveDate,
    pub slot: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl From<KeyedOdEntry> for OdEntryView {
    fn from(keyed: KeyedOdEntry) -> Self {
        Self {
            timestamp: keyed.key.into_string(),
            date: keyed.entry.date,
            slot: keyed.entry.slot,
            created_at: keyed.entry.created_at,
            coordinator_id: keyed.entry.granted_by_id,
            coordinator_name: keyed.entry.granted_by_name,
            event_name: keyed.entry.event_name,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OdHistoryData {
    pub student_info: StudentInfoView,
    pub entries: Vec<OdEntryView>,
    /// Entries returned after filtering.
    pub filtered_count: usize,
    /// Entries in the ledger before filtering.
    pub original_count: usize,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrantData {
    pub roll_number: String,
    pub student_name: String,
    pub timestamp: String,
    pub is_new_document: bool,
}

impl From<AddOdOutcome> for GrantData {
    fn from(outcome: AddOdOutcome) -> Self {
        Self {
            roll_number: outcome.roll_number,
            student_name: outcome.student_name,
            timestamp: outcome.entry_key.into_string(),
            is_new_document: outcome.is_new_document,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExistsData {
    pub exists: bool,
    pub entry: Option<OdEntryView>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CountData {
    pub roll_number: String,
    pub count: usize,
}

/// One row of a cross-student listing.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterRowView {
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub section: String,
    pub date: NaiveDate,
    pub slot: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_name: Option<String>,
}

impl From<OdRosterRow> for RosterRowView {
    fn from(row: OdRosterRow) -> Self {
        Self {
            roll_number: row.roll_number,
            student_name: row.student_name,
            department: row.department,
            section: row.section,
            date: row.date,
            slot: row.slot,
            event_name: row.event_name,
            created_at: row.created_at,
            coordinator_id: row.granted_by_id,
            coordinator_name: row.granted_by_name,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthData {
    pub name: String,
    pub version: String,
}
