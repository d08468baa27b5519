//! API error type and HTTP mapping.
//!
//! Every 4xx/5xx response body is `{ "detail": string }`. Domain errors
//! (store, worker) convert into these variants at the handler boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::domains::tasks::store::StoreError;

/// Errors surfaced by the REST layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input; the task is not created.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Attempted illegal status change.
    #[error("illegal status transition: {0}")]
    InvalidTransition(String),

    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidTransition(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::InvalidTransition { .. } | StoreError::ConcurrentTransition => {
                ApiError::InvalidTransition(err.to_string())
            }
            StoreError::Database(e) => ApiError::Internal(e.into()),
        }
    }
}
