//! crates/od_ledger_core/src/codec.rs
//!
//! Converts ledger documents to and from the flat field map they are stored as.
//!
//! A stored ledger keeps its profile snapshot in a handful of fixed top-level
//! fields. Every other top-level field is an entry key mapping to one entry
//! object, which is what lets an append be a single partial update.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::domain::{EntryKey, LedgerProfile, OdEntry, OdLedgerDocument, StudentProfile};
use crate::ports::Fields;

/// Top-level fields of a ledger document that are not entries.
pub const FIXED_FIELDS: [&str; 5] = [
    "rollNumber",
    "studentName",
    "department",
    "section",
    "createdAt",
];

//=========================================================================================
// "Impure" Storage Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    #[serde(default)]
    roll_number: Option<String>,
    student_name: String,
    department: String,
    section: String,
    created_at: DateTime<Utc>,
}

impl ProfileRecord {
    fn to_domain(self, key: &str) -> LedgerProfile {
        LedgerProfile {
            roll_number: self.roll_number.unwrap_or_else(|| key.to_string()),
            student_name: self.student_name,
            department: self.department,
            section: self.section,
            created_at: self.created_at,
        }
    }

    fn from_domain(profile: &LedgerProfile) -> Self {
        Self {
            roll_number: Some(profile.roll_number.clone()),
            student_name: profile.student_name.clone(),
            department: profile.department.clone(),
            section: profile.section.clone(),
            created_at: profile.created_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryRecord {
    date: NaiveDate,
    slot: u32,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_name: Option<String>,
}

impl EntryRecord {
    fn to_domain(self) -> Option<OdEntry> {
        // A zero slot can only come from a foreign writer.
        if self.slot == 0 {
            return None;
        }
        Some(OdEntry {
            date: self.date,
            slot: self.slot,
            created_at: self.created_at,
            granted_by_id: self.coordinator_id,
            granted_by_name: self.coordinator_name,
            event_name: self.event_name,
        })
    }

    fn from_domain(entry: &OdEntry) -> Self {
        Self {
            date: entry.date,
            slot: entry.slot,
            created_at: entry.created_at,
            coordinator_id: entry.granted_by_id.clone(),
            coordinator_name: entry.granted_by_name.clone(),
            event_name: entry.event_name.clone(),
        }
    }
}

#[derive(Deserialize)]
struct StudentRecord {
    name: String,
    department: String,
    section: String,
}

//=========================================================================================
// Encoding
//=========================================================================================

/// Encodes a whole ledger document for a full `set`.
pub fn encode_document(document: &OdLedgerDocument) -> serde_json::Result<Fields> {
    let mut fields = match serde_json::to_value(ProfileRecord::from_domain(&document.profile))? {
        Value::Object(map) => map,
        _ => Fields::new(),
    };
    for (key, entry) in &document.entries {
        fields.insert(key.to_string(), encode_entry(entry)?);
    }
    Ok(fields)
}

/// Encodes the single-field patch that appends `entry` under `key`.
pub fn encode_entry_patch(key: &EntryKey, entry: &OdEntry) -> serde_json::Result<Fields> {
    let mut fields = Fields::new();
    fields.insert(key.to_string(), encode_entry(entry)?);
    Ok(fields)
}

fn encode_entry(entry: &OdEntry) -> serde_json::Result<Value> {
    serde_json::to_value(EntryRecord::from_domain(entry))
}

//=========================================================================================
// Decoding
//=========================================================================================

/// Decodes a stored ledger document.
///
/// Fails only if the profile snapshot is unreadable. Entry fields that do not
/// decode are skipped and logged.
pub fn decode_document(key: &str, fields: &Fields) -> serde_json::Result<OdLedgerDocument> {
    let profile = ProfileRecord::deserialize(&Value::Object(fields.clone()))?.to_domain(key);

    let mut entries = BTreeMap::new();
    for (name, value) in fields {
        if FIXED_FIELDS.contains(&name.as_str()) {
            continue;
        }
        match EntryRecord::deserialize(value).map(EntryRecord::to_domain) {
            Ok(Some(entry)) => {
                entries.insert(EntryKey::new(name.clone()), entry);
            }
            Ok(None) => warn!("Skipping OD entry {} of {}: slot must be positive", name, key),
            Err(e) => warn!("Skipping unreadable OD entry {} of {}: {}", name, key, e),
        }
    }

    Ok(OdLedgerDocument { profile, entries })
}

/// Decodes a document from the `students` collection.
pub fn decode_student(roll_number: &str, fields: &Fields) -> serde_json::Result<StudentProfile> {
    let record = StudentRecord::deserialize(&Value::Object(fields.clone()))?;
    Ok(StudentProfile {
        roll_number: roll_number.to_string(),
        name: record.name,
        department: record.department,
        section: record.section,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_document() -> OdLedgerDocument {
        let student = StudentProfile {
            roll_number: "CB.SC.U4CSE23001".to_string(),
            name: "Asha".to_string(),
            department: "CSE".to_string(),
            section: "A".to_string(),
        };
        let created_at = Utc.with_ymd_and_hms(2024, 8, 20, 9, 30, 0).unwrap();
        OdLedgerDocument::new(&student, created_at).with_entry(
            EntryKey::new("1724146200000"),
            OdEntry {
                date: NaiveDate::from_ymd_opt(2024, 8, 20).unwrap(),
                slot: 3,
                created_at,
                granted_by_id: Some("coord-1".to_string()),
                granted_by_name: Some("Ravi".to_string()),
                event_name: Some("Procession".to_string()),
            },
        )
    }

    #[test]
    fn encodes_profile_as_fixed_fields_and_entries_at_top_level() {
        let fields = encode_document(&sample_document()).unwrap();

        assert_eq!(fields["rollNumber"], json!("CB.SC.U4CSE23001"));
        assert_eq!(fields["studentName"], json!("Asha"));
        assert_eq!(fields["department"], json!("CSE"));
        assert_eq!(fields["section"], json!("A"));
        assert_eq!(fields["1724146200000"]["date"], json!("2024-08-20"));
        assert_eq!(fields["1724146200000"]["slot"], json!(3));
        assert_eq!(fields["1724146200000"]["coordinatorName"], json!("Ravi"));
        assert_eq!(fields["1724146200000"]["eventName"], json!("Procession"));
    }

    #[test]
    fn omits_absent_optional_entry_fields() {
        let mut document = sample_document();
        for entry in document.entries.values_mut() {
            entry.granted_by_id = None;
            entry.granted_by_name = None;
            entry.event_name = None;
        }
        let fields = encode_document(&document).unwrap();
        let entry = fields["1724146200000"].as_object().unwrap();

        assert!(!entry.contains_key("coordinatorId"));
        assert!(!entry.contains_key("coordinatorName"));
        assert!(!entry.contains_key("eventName"));
    }

    #[test]
    fn decodes_what_it_encodes() {
        let document = sample_document();
        let fields = encode_document(&document).unwrap();
        let decoded = decode_document("CB.SC.U4CSE23001", &fields).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn decodes_documents_written_with_millisecond_timestamps() {
        let fields = json!({
            "rollNumber": "A1",
            "studentName": "Asha",
            "department": "ECE",
            "section": "B",
            "createdAt": "2024-08-20T09:30:00.000Z",
            "1724146200000": {
                "date": "2024-08-20",
                "slot": 99,
                "createdAt": "2024-08-20T09:30:00.123Z",
                "eventName": "Gokulashtami Event"
            }
        });
        let decoded = decode_document("A1", fields.as_object().unwrap()).unwrap();

        assert_eq!(decoded.profile.department, "ECE");
        assert_eq!(decoded.entries.len(), 1);
        let entry = decoded.entries.values().next().unwrap();
        assert_eq!(entry.slot, 99);
        assert_eq!(entry.event_name.as_deref(), Some("Gokulashtami Event"));
    }

    #[test]
    fn skips_fields_that_are_not_entries() {
        let fields = json!({
            "studentName": "Asha",
            "department": "ECE",
            "section": "B",
            "createdAt": "2024-08-20T09:30:00Z",
            "notes": "hand edited",
            "1": { "date": "not-a-date", "slot": 1, "createdAt": "2024-08-20T09:30:00Z" },
            "2": { "date": "2024-08-20", "slot": 0, "createdAt": "2024-08-20T09:30:00Z" }
        });
        let decoded = decode_document("A1", fields.as_object().unwrap()).unwrap();

        assert_eq!(decoded.profile.roll_number, "A1");
        assert!(decoded.entries.is_empty());
    }

    #[test]
    fn rejects_document_without_profile_snapshot() {
        let fields = json!({ "1": { "date": "2024-08-20", "slot": 1 } });
        assert!(decode_document("A1", fields.as_object().unwrap()).is_err());
    }

    #[test]
    fn decodes_student_profile() {
        let fields = json!({ "name": "Asha", "department": "CSE", "section": "A", "year": 2 });
        let profile = decode_student("A1", fields.as_object().unwrap()).unwrap();
        assert_eq!(profile.roll_number, "A1");
        assert_eq!(profile.name, "Asha");
    }
}
