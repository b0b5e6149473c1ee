//! `ApiError`: every non-200 answer of the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::error::Error;

/// Error returned by handlers and middleware, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// The snippet could not be run to completion (timeout, install, spawn, empty code)
    BadRequest(String),

    /// Authentication failed; the detail is fixed per failure kind
    Unauthorized(&'static str),

    /// The request body was not an acceptable JSON document
    Rejection(StatusCode, String),

    /// Service plumbing failed
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Unauthorized(detail) => (StatusCode::UNAUTHORIZED, detail.to_string()),
            ApiError::Rejection(status, detail) => (status, detail),
            ApiError::Internal(detail) => {
                tracing::error!("Internal server error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
