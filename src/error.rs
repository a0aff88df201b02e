use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Application error taxonomy, mapped to HTTP statuses at the boundary.
///
/// Every variant renders as `{"error": "<message>"}`. Internal errors keep
/// their source for logging but never leak detail to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Event is full")]
    CapacityExceeded,
    #[error("{0}")]
    InvalidState(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            // The registration interface answers 400 for duplicate and
            // full-event failures; the taxonomy stays distinct internally.
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::CapacityExceeded => (StatusCode::BAD_REQUEST, "Event is full".to_string()),
            AppError::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}
