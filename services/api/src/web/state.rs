//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::DocumentStudentDirectory;
use crate::config::Config;
use od_ledger_core::ledger::OdLedger;
use od_ledger_core::ports::DocumentStore;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<OdLedger>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the ledger to `store`, which also backs the student directory.
    pub fn new(config: Arc<Config>, store: Arc<dyn DocumentStore>) -> Self {
        let directory = Arc::new(DocumentStudentDirectory::new(store.clone()));
        let ledger = OdLedger::new(directory, store)
            .with_default_event_name(config.default_event_name.clone());
        Self {
            ledger: Arc::new(ledger),
            config,
        }
    }
}
