//! crates/od_ledger_core/src/ledger.rs
//!
//! The OD ledger service: the insert protocol, the dedup check, history
//! retrieval and the cross-student scans.
//!
//! Every student has one ledger document in the `ODs` collection, keyed by
//! roll number. It is created lazily by the first grant and afterwards only
//! ever gains new entry keys through partial updates.
//!
//! `add_od_entry` on its own is a plain read-then-write with nothing held in
//! between: two concurrent calls for one student may both create the document
//! or both record the same date and slot. `grant_od` is the guarded flow; it
//! serializes check and write per student, but only within this process.

use chrono::NaiveDate;
use futures::try_join;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::codec;
use crate::domain::{
    AddOdOutcome, DuplicateCheck, GrantOutcome, NewOdEntry, OdEntry, OdLedgerDocument,
    OdRosterRow, StudentOdHistory, StudentProfile,
};
use crate::keys::EntryKeyGenerator;
use crate::ports::{Clock, DocumentStore, PortError, StudentDirectory, SystemClock};

/// Collection holding one ledger document per student.
pub const LEDGER_COLLECTION: &str = "ODs";
/// Collection holding student profiles.
pub const STUDENTS_COLLECTION: &str = "students";
/// Event name recorded by the guarded flow when the caller names none.
pub const DEFAULT_EVENT_NAME: &str = "Manual Entry";

//=========================================================================================
// Ledger Error and Result Types
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Student not found in directory: {0}")]
    StudentNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to read from the store: {0}")]
    ReadFailure(PortError),
    #[error("Failed to write to the store: {0}")]
    WriteFailure(PortError),
    #[error("Stored ledger is unreadable: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

//=========================================================================================
// The Ledger Service
//=========================================================================================

pub struct OdLedger {
    directory: Arc<dyn StudentDirectory>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    keys: EntryKeyGenerator,
    grant_locks: StudentLocks,
    default_event_name: String,
}

impl OdLedger {
    pub fn new(directory: Arc<dyn StudentDirectory>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            directory,
            store,
            clock: Arc::new(SystemClock),
            keys: EntryKeyGenerator::new(),
            grant_locks: StudentLocks::default(),
            default_event_name: DEFAULT_EVENT_NAME.to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.default_event_name = event_name.into();
        self
    }

    pub fn default_event_name(&self) -> &str {
        &self.default_event_name
    }

    // --- Writer ---

    /// Records one OD grant without checking for duplicates.
    ///
    /// Callers are expected to run `check_od_exists` first (or use `grant_od`).
    pub async fn add_od_entry(&self, request: NewOdEntry) -> LedgerResult<AddOdOutcome> {
        validate(&request)?;
        let request = request.normalized();
        let roll_number = request.roll_number.as_str();

        let (profile, existing) = try_join!(
            self.lookup_profile(roll_number),
            self.store_get(roll_number),
        )?;
        let Some(profile) = profile else {
            warn!("Refusing OD entry for unknown student {}", roll_number);
            return Err(LedgerError::StudentNotFound(roll_number.to_string()));
        };

        let created_at = self.clock.now();
        let key = self.keys.next_key(created_at);
        let entry = OdEntry {
            date: request.date,
            slot: request.slot,
            created_at,
            granted_by_id: request.granted_by_id,
            granted_by_name: request.granted_by_name,
            event_name: request.event_name,
        };

        let is_new_document = existing.is_none();
        if is_new_document {
            let document = OdLedgerDocument::new(&profile, created_at).with_entry(key.clone(), entry);
            let fields = codec::encode_document(&document)?;
            self.store
                .set(LEDGER_COLLECTION, roll_number, fields)
                .await
                .map_err(|e| {
                    error!("Failed to create OD ledger for {}: {}", roll_number, e);
                    LedgerError::WriteFailure(e)
                })?;
            info!(
                "Created OD ledger for {} with entry {} ({} slot {})",
                roll_number, key, request.date, request.slot
            );
        } else {
            let fields = codec::encode_entry_patch(&key, &entry)?;
            self.store
                .update(LEDGER_COLLECTION, roll_number, fields)
                .await
                .map_err(|e| {
                    error!("Failed to append OD entry for {}: {}", roll_number, e);
                    LedgerError::WriteFailure(e)
                })?;
            info!(
                "Appended OD entry {} for {} ({} slot {})",
                key, roll_number, request.date, request.slot
            );
        }

        let message = if is_new_document {
            format!("New OD document created for {}", profile.name)
        } else {
            format!("OD entry added for {}", profile.name)
        };
        Ok(AddOdOutcome {
            roll_number: profile.roll_number,
            student_name: profile.name,
            entry_key: key,
            is_new_document,
            message,
        })
    }

    /// The guarded grant flow: validate, short-circuit on a duplicate, then write.
    ///
    /// Concurrent calls for the same student within this process are
    /// serialized, so at most one of them records a given date and slot.
    pub async fn grant_od(&self, request: NewOdEntry) -> LedgerResult<GrantOutcome> {
        validate(&request)?;
        let mut request = request.normalized();
        if request.event_name.is_none() {
            request.event_name = Some(self.default_event_name.clone());
        }

        let _lease = self.grant_locks.acquire(&request.roll_number).await;

        let check = self
            .check_od_exists(&request.roll_number, request.date, request.slot)
            .await?;
        if let Some(existing) = check.entry {
            info!(
                "OD already exists for {} on {} slot {}",
                request.roll_number, request.date, request.slot
            );
            return Ok(GrantOutcome::Duplicate(existing));
        }

        self.add_od_entry(request).await.map(GrantOutcome::Granted)
    }

    // --- Reader ---

    /// Fetches a student's full history, most recent grant first.
    ///
    /// Returns `Ok(None)` when the student has no ledger yet.
    pub async fn od_entries_for_student(
        &self,
        roll_number: &str,
    ) -> LedgerResult<Option<StudentOdHistory>> {
        let Some(fields) = self.store_get(roll_number).await? else {
            return Ok(None);
        };
        let document = codec::decode_document(roll_number, &fields)?;
        Ok(Some(document.into_history()))
    }

    /// Looks for an entry with the given date and slot in the student's ledger.
    pub async fn check_od_exists(
        &self,
        roll_number: &str,
        date: NaiveDate,
        slot: u32,
    ) -> LedgerResult<DuplicateCheck> {
        let Some(history) = self.od_entries_for_student(roll_number).await? else {
            return Ok(DuplicateCheck::absent());
        };
        let entry = history
            .entries
            .into_iter()
            .find(|keyed| keyed.entry.is_for(date, slot));
        Ok(DuplicateCheck {
            exists: entry.is_some(),
            entry,
        })
    }

    /// Number of entries in the student's ledger; zero when there is none.
    pub async fn od_count_for_student(&self, roll_number: &str) -> LedgerResult<usize> {
        Ok(self
            .od_entries_for_student(roll_number)
            .await?
            .map_or(0, |history| history.count()))
    }

    // --- Cross-student scans ---

    /// Every grant for `event_name` on `date`, across all students.
    ///
    /// This is a full scan of the ledger collection.
    pub async fn od_entries_by_event_and_date(
        &self,
        event_name: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<OdRosterRow>> {
        self.scan_rows(|_, entry| entry.date == date && entry.event_name.as_deref() == Some(event_name))
            .await
    }

    /// Every grant on `date`, optionally restricted to one slot and one department.
    ///
    /// Same full scan and ordering as `od_entries_by_event_and_date`.
    pub async fn od_entries_for_date_and_slot(
        &self,
        date: NaiveDate,
        slot: Option<u32>,
        department: Option<&str>,
    ) -> LedgerResult<Vec<OdRosterRow>> {
        self.scan_rows(|document, entry| {
            entry.date == date
                && slot.map_or(true, |slot| entry.slot == slot)
                && department.map_or(true, |d| document.profile.department == d)
        })
        .await
    }

    /// Scans every ledger and returns the matching rows ordered by department,
    /// then roll number.
    async fn scan_rows<F>(&self, keep: F) -> LedgerResult<Vec<OdRosterRow>>
    where
        F: Fn(&OdLedgerDocument, &OdEntry) -> bool,
    {
        let documents = self.store.scan_all(LEDGER_COLLECTION).await.map_err(|e| {
            error!("Failed to scan OD ledgers: {}", e);
            LedgerError::ReadFailure(e)
        })?;

        let mut rows = Vec::new();
        for (key, fields) in &documents {
            match codec::decode_document(key, fields) {
                Ok(document) => rows.extend(document.roster_rows(|entry| keep(&document, entry))),
                Err(e) => warn!("Skipping unreadable OD ledger {}: {}", key, e),
            }
        }

        rows.sort_by(|a, b| {
            a.department
                .cmp(&b.department)
                .then_with(|| a.roll_number.cmp(&b.roll_number))
        });
        Ok(rows)
    }

    // --- Store helpers ---

    async fn lookup_profile(&self, roll_number: &str) -> LedgerResult<Option<StudentProfile>> {
        self.directory.get_profile(roll_number).await.map_err(|e| {
            error!("Failed to look up student {}: {}", roll_number, e);
            LedgerError::ReadFailure(e)
        })
    }

    async fn store_get(&self, roll_number: &str) -> LedgerResult<Option<crate::ports::Fields>> {
        self.store
            .get(LEDGER_COLLECTION, roll_number)
            .await
            .map_err(|e| {
                error!("Failed to read OD ledger for {}: {}", roll_number, e);
                LedgerError::ReadFailure(e)
            })
    }
}

fn validate(request: &NewOdEntry) -> LedgerResult<()> {
    if request.roll_number.trim().is_empty() {
        return Err(LedgerError::InvalidInput(
            "roll number must not be empty".to_string(),
        ));
    }
    if request.slot == 0 {
        return Err(LedgerError::InvalidInput(
            "slot must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

//=========================================================================================
// Per-Student Grant Locks
//=========================================================================================

/// One async mutex per roll number with a grant in flight.
///
/// Entries are dropped again by the last `StudentLease` to let go of them.
#[derive(Default)]
struct StudentLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StudentLocks {
    async fn acquire(&self, roll_number: &str) -> StudentLease<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(roll_number.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        StudentLease {
            locks: self,
            roll_number: roll_number.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds one student's grant lock until dropped.
struct StudentLease<'a> {
    locks: &'a StudentLocks,
    roll_number: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for StudentLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .locks
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means nobody is queued.
        if locks
            .get(&self.roll_number)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.roll_number);
        }
    }
}
