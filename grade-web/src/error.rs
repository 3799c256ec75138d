//! Error types for grade-web
//!
//! Handlers return [`ApiResult`]; every error renders as a plain-text body
//! with the matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Not signed in (401)
    #[error("Not signed in")]
    Unauthorized,

    /// Signed in but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Identity provider failure (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// grade-common error
    #[error(transparent)]
    Common(#[from] grade_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) => match err {
                grade_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                grade_common::Error::InvalidInput(_) | grade_common::Error::Csv(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg) => msg,
            ApiError::Common(grade_common::Error::InvalidInput(msg))
            | ApiError::Common(grade_common::Error::NotFound(msg)) => msg,
            ApiError::Unauthorized => "Please sign in first".to_string(),
            ApiError::Upstream(_) => "Identity provider unavailable".to_string(),
            // Internal details stay in the log
            _ => "Internal server error".to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
