//! REST API module.
//!
//! Thin handlers over [`crate::hub::Hub`]; every response carries the hub revision.

mod catalog;
mod entries;
mod share;
mod view;

pub use catalog::*;
pub use entries::*;
pub use share::*;
pub use view::*;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Unwrap a JSON body, turning a parse failure into `BadRequest`.
pub fn json_body<T>(
    body: Result<Json<T>, JsonRejection>,
    revision_id: i64,
) -> Result<T, crate::errors::AppErrorWithRevision> {
    body.map(|Json(value)| value)
        .map_err(|rejection| crate::errors::AppErrorWithRevision {
            error: crate::errors::AppError::BadRequest(rejection.body_text()),
            revision_id,
        })
}
