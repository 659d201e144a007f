//! Error handling module for the challenge hub.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{FetchError, FetchErrorKind};
use crate::snapshot::MalformedSnapshotError;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const REMOTE_FETCH_ERROR: &str = "REMOTE_FETCH_ERROR";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const MALFORMED_SNAPSHOT: &str = "MALFORMED_SNAPSHOT";
    pub const PERSISTENCE_READ_ERROR: &str = "PERSISTENCE_READ_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Authentication required
    #[error("{code}: {0}", code = codes::UNAUTHORIZED)]
    Unauthorized(String),
    /// Unknown entry or identifier
    #[error("{code}: {0}", code = codes::NOT_FOUND)]
    NotFound(String),
    /// Bad user input to add/update
    #[error("{code}: {0}", code = codes::VALIDATION_ERROR)]
    Validation(String),
    /// Catalog call failed for one identifier
    #[error("{code}: {0}", code = codes::REMOTE_FETCH_ERROR)]
    RemoteFetch(String),
    /// Catalog is throttling us
    #[error("{code}: {0}", code = codes::RATE_LIMITED)]
    RateLimited(String),
    /// Inbound snapshot token could not be decoded
    #[error("{code}: {0}", code = codes::MALFORMED_SNAPSHOT)]
    MalformedSnapshot(String),
    /// Local store slot held unreadable data
    #[error("{code}: {0}", code = codes::PERSISTENCE_READ_ERROR)]
    PersistenceRead(String),
    /// Local store backend error
    #[error("{code}: {0}", code = codes::STORAGE_ERROR)]
    Storage(String),
    /// Internal server error
    #[error("{code}: {0}", code = codes::INTERNAL_ERROR)]
    Internal(String),
    /// Bad request
    #[error("{code}: {0}", code = codes::BAD_REQUEST)]
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RemoteFetch(_) => StatusCode::BAD_GATEWAY,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::MalformedSnapshot(_) => StatusCode::BAD_REQUEST,
            AppError::PersistenceRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::RemoteFetch(_) => codes::REMOTE_FETCH_ERROR,
            AppError::RateLimited(_) => codes::RATE_LIMITED,
            AppError::MalformedSnapshot(_) => codes::MALFORMED_SNAPSHOT,
            AppError::PersistenceRead(_) => codes::PERSISTENCE_READ_ERROR,
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::RemoteFetch(msg)
            | AppError::RateLimited(msg)
            | AppError::MalformedSnapshot(msg)
            | AppError::PersistenceRead(msg)
            | AppError::Storage(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Storage error: {:?}", err);
        AppError::Storage(format!("Storage error: {}", err))
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::RateLimited => AppError::RateLimited(err.to_string()),
            FetchErrorKind::NotFound => AppError::NotFound(err.to_string()),
            FetchErrorKind::Unauthorized | FetchErrorKind::Transport => {
                AppError::RemoteFetch(err.to_string())
            }
        }
    }
}

impl From<MalformedSnapshotError> for AppError {
    fn from(err: MalformedSnapshotError) -> Self {
        AppError::MalformedSnapshot(err.0)
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details: None,
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}
