use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// ApiError
///
/// The closed error taxonomy exposed by the service. Store and engine
/// operations never produce these directly — they return optionals or outcome
/// enums — the handlers map those outcomes (and boundary validation failures)
/// into one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity absent. Deliberately also used when a private post exists but
    /// the actor may not see it, so not-found never leaks existence.
    #[error("{0}")]
    NotFound(String),
    /// Entity exists but the actor lacks rights to it.
    #[error("{0}")]
    Forbidden(String),
    /// No valid actor where one is required.
    #[error("{0}")]
    Unauthorized(String),
    /// Malformed input detected at the boundary, before the core is invoked.
    #[error("{0}")]
    InvalidArgument(String),
    /// Unexpected failure. Should not occur in correct usage.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::InvalidArgument(_) => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(detail) => {
                // The underlying cause is logged with a correlation reference;
                // the client only ever sees the reference.
                let reference = Uuid::new_v4();
                tracing::error!(%reference, detail = %detail, "internal error");
                ErrorResponse {
                    error: self.code().to_string(),
                    message: format!("Unexpected error. Reference: {}", reference),
                }
            }
            _ => ErrorResponse {
                error: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// ErrorResponse
///
/// The JSON error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ErrorResponse {
    /// Stable machine-readable code: not_found, forbidden, unauthorized,
    /// invalid_request or internal_error.
    pub error: String,
    pub message: String,
}
