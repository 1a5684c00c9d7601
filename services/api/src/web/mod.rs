pub mod protocol;
pub mod rest;
pub mod router;
pub mod state;

// Re-export the router builder and the handlers to make them easily accessible
// to the binaries and the integration tests.
pub use rest::{
    event_roster_handler, grant_od_handler, od_count_handler, od_exists_handler,
    slot_roster_handler, student_history_handler,
};
pub use router::build_router;
