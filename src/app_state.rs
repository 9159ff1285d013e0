//! Shared state injected into the operations endpoint handlers.

use std::sync::Arc;

use crate::persistence::Store;

/// State available to all handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Store the ingestion loop writes to; read for progress reporting.
    pub store: Arc<dyn Store>,
    /// Block the loop starts from while no cursor is stored.
    pub start_block: u64,
}
