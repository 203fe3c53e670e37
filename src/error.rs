//! Request-path error taxonomy for the meterhub API.
//!
//! Every failure in a handler or the evaluator is one of four kinds, each
//! with a fixed HTTP mapping:
//! - [`AppError::NotFound`]      → 404, referenced entity does not exist
//! - [`AppError::Validation`]    → 400, malformed input or business-rule violation
//! - [`AppError::Authorization`] → 403, caller's scope excludes the target
//! - [`AppError::Storage`]       → 500, underlying datastore failure
//!
//! All errors are synchronous and final — nothing here is retried. Storage
//! errors are logged with their cause but surfaced to the caller as a
//! generic message.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;

// ---

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("database error")]
    Storage(#[from] sqlx::Error),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        AppError::Authorization(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Storage(cause) => {
                tracing::error!("storage failure: {cause}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        // ---
        let err = AppError::validation("reading cannot be lower than previous reading");
        assert_eq!(
            err.to_string(),
            "reading cannot be lower than previous reading"
        );

        let err = AppError::not_found("meter 42 not found");
        assert_eq!(err.to_string(), "meter 42 not found");
    }

    #[test]
    fn storage_errors_hide_their_cause() {
        // ---
        let err = AppError::Storage(sqlx::Error::PoolClosed);
        assert_eq!(err.to_string(), "database error");
    }
}
