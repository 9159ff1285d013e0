//! Handlers for `/health` and `/status`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

/// Ingestion progress response.
#[derive(Debug, Serialize)]
struct StatusResponse {
    last_processed_block: u64,
    updated_at: Option<String>,
}

/// `GET /health`: service liveness, version and current time.
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// `GET /status`: the stored ingestion cursor.
///
/// Before the first advance the configured start block is reported with a
/// null `updated_at`. Store failures answer `503`.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.cursor().await {
        Ok(cursor) => {
            let body = StatusResponse {
                last_processed_block: cursor
                    .map_or(state.start_block, |c| c.last_processed_block),
                updated_at: cursor.map(|c| c.updated_at.to_rfc3339()),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "status lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::persistence::{MemoryStore, Store};

    use super::*;

    fn app(store: Arc<MemoryStore>) -> axum::Router {
        crate::api::build_router().with_state(AppState {
            store: store as Arc<dyn Store>,
            start_block: 500,
        })
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), 64 * 1024).await else {
            panic!("body");
        };
        let Ok(json) = serde_json::from_slice(&bytes) else {
            panic!("json");
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (status, body) = get_json(app(Arc::new(MemoryStore::new())), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&Value::from("healthy")));
        assert_eq!(
            body.get("version"),
            Some(&Value::from(env!("CARGO_PKG_VERSION")))
        );
    }

    #[tokio::test]
    async fn status_reports_start_block_then_cursor() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = get_json(app(Arc::clone(&store)), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("last_processed_block"), Some(&Value::from(500)));
        assert!(body.get("updated_at").is_some_and(Value::is_null));

        let Ok(_) = store.advance_cursor(812).await else {
            panic!("advance failed");
        };
        let (_, body) = get_json(app(store), "/status").await;
        assert_eq!(body.get("last_processed_block"), Some(&Value::from(812)));
        assert!(body.get("updated_at").is_some_and(Value::is_string));
    }
}
