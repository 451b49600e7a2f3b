use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use voyage_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    AuthenticationError(String),
    #[error("forbidden: {0}")]
    AuthorizationError(String),
    #[error("invalid request: {0}")]
    ValidationError(String),
    #[error("not found: {0}")]
    NotFoundError(String),
    #[error("conflict: {0}")]
    ConflictError(String),
    #[error("payment provider error: {0}")]
    UpstreamError(String),
    #[error("internal error: {0}")]
    InternalServerError(String),
}

/// Response extension set on errors caused by the payment processor; the
/// circuit breaker counts these instead of inspecting status codes.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamFailure;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let upstream = matches!(self, AppError::UpstreamError(_));
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Payment provider unavailable, please retry".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        let mut response = (status, body).into_response();
        if upstream {
            response.extensions_mut().insert(UpstreamFailure);
        }
        response
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            CoreError::UpstreamError(msg) => AppError::UpstreamError(msg),
            CoreError::StorageError(msg) | CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
