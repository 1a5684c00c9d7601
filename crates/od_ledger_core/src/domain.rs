//! crates/od_ledger_core/src/domain.rs
//!
//! Defines the pure, core data structures for the OD ledger.
//! These structs are independent of any database or serialization format;
//! the flat field layout a ledger document has in storage lives in `codec.rs`.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;

//=========================================================================================
// Student Directory Types
//=========================================================================================

/// A student as known to the student directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub roll_number: String,
    pub name: String,
    pub department: String,
    pub section: String,
}

//=========================================================================================
// Ledger Types
//=========================================================================================

/// Opaque key an entry is stored under inside its ledger document.
///
/// Derived from the write timestamp, but never parsed for meaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One excused-slot grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdEntry {
    /// The day the student missed class.
    pub date: NaiveDate,
    pub slot: u32,
    /// When the entry was recorded. Authoritative ordering key.
    pub created_at: DateTime<Utc>,
    pub granted_by_id: Option<String>,
    pub granted_by_name: Option<String>,
    pub event_name: Option<String>,
}

impl OdEntry {
    pub fn is_for(&self, date: NaiveDate, slot: u32) -> bool {
        self.date == date && self.slot == slot
    }
}

/// The profile snapshot a ledger document carries.
///
/// Captured when the document is created and never re-synced afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerProfile {
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub section: String,
    pub created_at: DateTime<Utc>,
}

/// The per-student ledger: a profile snapshot plus every OD entry granted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdLedgerDocument {
    pub profile: LedgerProfile,
    pub entries: BTreeMap<EntryKey, OdEntry>,
}

impl OdLedgerDocument {
    /// Starts an empty ledger for `student`, snapshotting its profile.
    pub fn new(student: &StudentProfile, created_at: DateTime<Utc>) -> Self {
        Self {
            profile: LedgerProfile {
                roll_number: student.roll_number.clone(),
                student_name: student.name.clone(),
                department: student.department.clone(),
                section: student.section.clone(),
                created_at,
            },
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: EntryKey, entry: OdEntry) -> Self {
        self.entries.insert(key, entry);
        self
    }

    pub fn student_info(&self) -> StudentInfo {
        StudentInfo {
            roll_number: self.profile.roll_number.clone(),
            student_name: self.profile.student_name.clone(),
            department: self.profile.department.clone(),
            section: self.profile.section.clone(),
        }
    }

    /// Converts the document into its presentation form, most recent grant first.
    pub fn into_history(self) -> StudentOdHistory {
        let student = self.student_info();
        let mut entries: Vec<KeyedOdEntry> = self
            .entries
            .into_iter()
            .map(|(key, entry)| KeyedOdEntry { key, entry })
            .collect();
        sort_most_recent_first(&mut entries);
        StudentOdHistory { student, entries }
    }

    /// Builds one roster row per entry accepted by `keep`.
    pub fn roster_rows<F>(&self, mut keep: F) -> Vec<OdRosterRow>
    where
        F: FnMut(&OdEntry) -> bool,
    {
        self.entries
            .values()
            .filter(|entry| keep(entry))
            .map(|entry| OdRosterRow {
                roll_number: self.profile.roll_number.clone(),
                student_name: self.profile.student_name.clone(),
                department: self.profile.department.clone(),
                section: self.profile.section.clone(),
                date: entry.date,
                slot: entry.slot,
                event_name: entry.event_name.clone(),
                created_at: entry.created_at,
                granted_by_id: entry.granted_by_id.clone(),
                granted_by_name: entry.granted_by_name.clone(),
            })
            .collect()
    }
}

/// Sorts by `created_at` descending; equal stamps fall back to key descending.
pub fn sort_most_recent_first(entries: &mut [KeyedOdEntry]) {
    entries.sort_by(|a, b| {
        b.entry
            .created_at
            .cmp(&a.entry.created_at)
            .then_with(|| b.key.cmp(&a.key))
    });
}

//=========================================================================================
// Operation Inputs and Results
//=========================================================================================

/// A request to record one OD grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOdEntry {
    pub roll_number: String,
    pub date: NaiveDate,
    pub slot: u32,
    pub granted_by_id: Option<String>,
    pub granted_by_name: Option<String>,
    pub event_name: Option<String>,
}

impl NewOdEntry {
    pub fn new(roll_number: impl Into<String>, date: NaiveDate, slot: u32) -> Self {
        Self {
            roll_number: roll_number.into(),
            date,
            slot,
            granted_by_id: None,
            granted_by_name: None,
            event_name: None,
        }
    }

    pub fn granted_by(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.granted_by_id = Some(id.into());
        self.granted_by_name = Some(name.into());
        self
    }

    pub fn event(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    /// Trims the optional text fields and drops the ones left blank.
    pub fn normalized(mut self) -> Self {
        self.granted_by_id = non_blank(self.granted_by_id);
        self.granted_by_name = non_blank(self.granted_by_name);
        self.event_name = non_blank(self.event_name);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The student fields returned alongside an OD history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentInfo {
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub section: String,
}

/// An entry annotated with the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedOdEntry {
    pub key: EntryKey,
    pub entry: OdEntry,
}

/// A student's full OD history, most recent grant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentOdHistory {
    pub student: StudentInfo,
    pub entries: Vec<KeyedOdEntry>,
}

impl StudentOdHistory {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOdOutcome {
    pub roll_number: String,
    pub student_name: String,
    pub entry_key: EntryKey,
    /// `true` when this write created the student's ledger document.
    pub is_new_document: bool,
    pub message: String,
}

/// Result of the dedup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub exists: bool,
    pub entry: Option<KeyedOdEntry>,
}

impl DuplicateCheck {
    pub fn absent() -> Self {
        Self {
            exists: false,
            entry: None,
        }
    }
}

/// Result of the guarded grant flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted(AddOdOutcome),
    /// A grant for the same date and slot was already recorded; nothing was written.
    Duplicate(KeyedOdEntry),
}

/// One row of a cross-student listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdRosterRow {
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub section: String,
    pub date: NaiveDate,
    pub slot: u32,
    pub event_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub granted_by_id: Option<String>,
    pub granted_by_name: Option<String>,
}
