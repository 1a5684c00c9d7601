//! crates/od_ledger_core/src/ports.rs
//!
//! Defines the service contracts (traits) the ledger is built on.
//! These traits form the boundary of the hexagonal architecture: the ledger
//! only ever talks to a generic document store, a read-only student directory
//! and a clock, so it stays independent of PostgreSQL or any other backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::StudentProfile;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The top-level fields of one stored document.
pub type Fields = Map<String, Value>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A generic key/value document store.
///
/// Documents live in named collections and are addressed by a string key.
/// There are no transactions and no secondary indices: the ledger is built
/// entirely on these four primitives.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one document. Returns `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, key: &str) -> PortResult<Option<Fields>>;

    /// Writes a document, replacing any existing one under the same key.
    async fn set(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()>;

    /// Merges `fields` into the top level of an existing document.
    ///
    /// Fields not named in `fields` are left untouched. Fails with
    /// `PortError::NotFound` if the document does not exist.
    async fn update(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()>;

    /// Enumerates every document in a collection as `(key, fields)` pairs.
    async fn scan_all(&self, collection: &str) -> PortResult<Vec<(String, Fields)>>;
}

/// Read-only lookup of student profiles by roll number.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get_profile(&self, roll_number: &str) -> PortResult<Option<StudentProfile>>;
}

/// Source of the current time for `createdAt` stamps and entry keys.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
