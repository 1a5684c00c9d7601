pub mod codec;
pub mod domain;
pub mod filters;
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod ports;

pub use domain::{
    AddOdOutcome, DuplicateCheck, EntryKey, GrantOutcome, KeyedOdEntry, LedgerProfile, NewOdEntry,
    OdEntry, OdLedgerDocument, OdRosterRow, StudentInfo, StudentOdHistory, StudentProfile,
};
pub use filters::{FilteredHistory, OdFilter};
pub use ledger::{LedgerError, LedgerResult, OdLedger};
pub use memory::InMemoryDocumentStore;
pub use ports::{
    Clock, DocumentStore, Fields, PortError, PortResult, StudentDirectory, SystemClock,
};
