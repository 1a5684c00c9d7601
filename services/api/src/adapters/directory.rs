//! services/api/src/adapters/directory.rs
//!
//! Implements the `StudentDirectory` port on top of the `students` collection
//! of any `DocumentStore`.

use async_trait::async_trait;
use od_ledger_core::codec;
use od_ledger_core::domain::StudentProfile;
use od_ledger_core::ledger::STUDENTS_COLLECTION;
use od_ledger_core::ports::{DocumentStore, PortError, PortResult, StudentDirectory};
use std::sync::Arc;

/// Reads student profiles from the document store. Never writes.
#[derive(Clone)]
pub struct DocumentStudentDirectory {
    store: Arc<dyn DocumentStore>,
}

impl DocumentStudentDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StudentDirectory for DocumentStudentDirectory {
    async fn get_profile(&self, roll_number: &str) -> PortResult<Option<StudentProfile>> {
        let Some(fields) = self.store.get(STUDENTS_COLLECTION, roll_number).await? else {
            return Ok(None);
        };
        codec::decode_student(roll_number, &fields)
            .map(Some)
            .map_err(|e| PortError::Unexpected(format!("Student {} is malformed: {}", roll_number, e)))
    }
}
