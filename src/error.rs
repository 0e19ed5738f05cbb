//! Error types for the link audit service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Audit Error Enum ==
/// Unified error type for the link audit service.
#[derive(Error, Debug, Clone)]
pub enum AuditError {
    /// Requested item (job, rule, cache key) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed configuration; fatal at start-up
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Durable store unavailable or rejected a write
    #[error("Store error: {0}")]
    Store(String),

    /// A single probe failed terminally (after the prober's own retries)
    #[error("Probe failed: {0}")]
    Probe(String),

    /// Cache snapshot could not be written or read
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuditError::NotFound(_) => StatusCode::NOT_FOUND,
            AuditError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuditError::Store(_) | AuditError::Probe(_) => StatusCode::BAD_GATEWAY,
            AuditError::InvalidConfig(_)
            | AuditError::Snapshot(_)
            | AuditError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        AuditError::Snapshot(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the link audit service.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = AuditError::NotFound("job".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AuditError::InvalidRequest("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AuditError::Store("down".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AuditError::Probe("connection refused".into());
        assert_eq!(err.to_string(), "Probe failed: connection refused");
    }
}
