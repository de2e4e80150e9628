use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::storage::StoreError;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Unprocessable(msg) => msg,
            AppError::Unauthorized(msg) => {
                return (
                    status,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(ErrorBody { detail: msg }),
                )
                    .into_response();
            }
            AppError::Store(e) => {
                error!(error = %e, "storage error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "internal error");
                "Internal server error".to_string()
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
