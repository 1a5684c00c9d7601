//! services/api/src/web/router.rs
//!
//! Builds the axum router: the OD ledger endpoints, CORS and the Swagger UI.

use crate::web::rest::{
    event_roster_handler, grant_od_handler, health_handler, od_count_handler,
    od_exists_handler, slot_roster_handler, student_history_handler, ApiDoc,
};
use crate::web::state::AppState;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the complete application router over `app_state`.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Static segments win over `{roll_number}`, so `/ods/events` and
    // `/ods/slots` never reach the history handler.
    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route("/ods", post(grant_od_handler))
        .route("/ods/events", get(event_roster_handler))
        .route("/ods/slots", get(slot_roster_handler))
        .route("/ods/{roll_number}", get(student_history_handler))
        .route("/ods/{roll_number}/exists", get(od_exists_handler))
        .route("/ods/{roll_number}/count", get(od_count_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
