//! Indexer error types with failure classification.
//!
//! [`IndexerError`] is the central error type for the pipeline. Callers never
//! branch on variants directly; they ask the classification helpers
//! ([`IndexerError::is_transient`], [`IndexerError::is_duplicate`],
//! [`IndexerError::is_cancelled`]) which encode the error taxonomy:
//!
//! | Class        | Variants                                        | Handling                      |
//! |--------------|-------------------------------------------------|-------------------------------|
//! | Transient    | `Transport`, `Timeout`, unknown `Rpc` errors    | retried with backoff          |
//! | Duplicate    | `Duplicate`                                     | treated as an applied no-op   |
//! | Decode       | `Decode`                                        | log skipped with a warning    |
//! | Cancellation | `Cancelled`                                     | clean shutdown, not a failure |
//! | Everything else | `Persistence`, `InvalidResponse`, ...        | logged, cycle retried later   |

/// JSON-RPC error codes that signal a node-side hiccup rather than a
/// deterministic failure of the call itself.
const TRANSIENT_RPC_CODES: [i64; 3] = [-32603, -32005, -32000];

/// Pipeline-wide error enum.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A unique constraint rejected the write; the row already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Network-level failure (connection refused, reset, HTTP 5xx/429).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// JSON-RPC error object returned by the node.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Node-provided message.
        message: String,
    },

    /// A transient failure persisted through every retry attempt.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Display form of the final error.
        last_error: String,
    },

    /// A raw log could not be decoded into a contract event.
    #[error("decode error: {0}")]
    Decode(String),

    /// An external service answered with a malformed payload.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Metadata enrichment failed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Notification delivery failed.
    #[error("notification error: {0}")]
    Notification(String),

    /// Shutdown was requested while waiting.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Returns `true` if the failure may resolve on its own and the call is
    /// safe to repeat.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Rpc { code, message } => {
                TRANSIENT_RPC_CODES.contains(code) && !message.to_lowercase().contains("revert")
            }
            _ => false,
        }
    }

    /// Returns `true` if a unique constraint rejected the write.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Returns `true` if the error is a shutdown request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(db.message().to_string())
            }
            _ => Self::Persistence(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for IndexerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_transient() {
        assert!(IndexerError::Transport("reset".into()).is_transient());
        assert!(IndexerError::Timeout("30s".into()).is_transient());
    }

    #[test]
    fn unknown_rpc_errors_are_transient() {
        let err = IndexerError::Rpc {
            code: -32603,
            message: "internal error".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn reverts_are_permanent() {
        let err = IndexerError::Rpc {
            code: -32000,
            message: "execution reverted".into(),
        };
        assert!(!err.is_transient());

        let invalid_params = IndexerError::Rpc {
            code: -32602,
            message: "invalid params".into(),
        };
        assert!(!invalid_params.is_transient());
    }

    #[test]
    fn persistence_and_decode_are_permanent() {
        assert!(!IndexerError::Persistence("x".into()).is_transient());
        assert!(!IndexerError::Decode("x".into()).is_transient());
        assert!(!IndexerError::Cancelled.is_transient());
    }

    #[test]
    fn duplicate_and_cancelled_classification() {
        assert!(IndexerError::Duplicate("listings_listing_id_key".into()).is_duplicate());
        assert!(!IndexerError::Persistence("x".into()).is_duplicate());
        assert!(IndexerError::Cancelled.is_cancelled());
    }

    #[test]
    fn retry_exhausted_display() {
        let err = IndexerError::RetryExhausted {
            attempts: 5,
            last_error: "transport error: reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 5 attempts: transport error: reset"
        );
    }
}
