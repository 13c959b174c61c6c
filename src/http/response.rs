//! Response shaping and error mapping.
//!
//! Every success is wrapped in [`ApiResponse`]; every failure is rendered
//! by [`ApiError`] as `{statusCode, message, error, timestamp}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::query::{Paginated, PaginationMeta};
use crate::store::memory::now_timestamp;
use crate::store::StoreError;

/// Success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data,
            pagination: None,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: StatusCode::CREATED.as_u16(),
            ..Self::ok(message, data)
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn paginated(message: impl Into<String>, page: Paginated<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::ok(message, page.data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
    error: &'static str,
    timestamp: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Store failure: {0}")]
    Store(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Store(detail) => {
                tracing::error!(detail = %detail, "Store error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
            error: status.canonical_reason().unwrap_or("Error"),
            timestamp: now_timestamp(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownCollection(_) | StoreError::NotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::InvalidRecord(_) => ApiError::BadRequest(err.to_string()),
            StoreError::Seed(_) => ApiError::Store(err.to_string()),
        }
    }
}
