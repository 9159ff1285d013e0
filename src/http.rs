//! Shared `reqwest` plumbing for the outbound HTTP clients.

use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::error::IndexerError;

/// Builds a client with a per-request timeout.
///
/// # Errors
///
/// Returns [`IndexerError::Config`] if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, IndexerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| IndexerError::Config(format!("http client: {e}")))
}

/// Passes successful responses through and classifies the rest.
///
/// `429` and `5xx` are transient; any other non-success status is permanent.
///
/// # Errors
///
/// [`IndexerError::Transport`] for retryable statuses,
/// [`IndexerError::InvalidResponse`] otherwise.
pub async fn check_status(response: Response) -> Result<Response, IndexerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(IndexerError::Transport(message))
    } else {
        Err(IndexerError::InvalidResponse(message))
    }
}
