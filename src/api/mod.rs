//! Operations endpoint: liveness and ingestion progress.
//!
//! The query API over listings, trades and history lives outside this
//! service; only the two operational routes are mounted here.

pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// Builds the operations router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
}
