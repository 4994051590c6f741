//! Shared error taxonomy and its mapping onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// Every fallible operation in the service returns this type. Domain
/// services never leak `rusqlite::Error` or `std::io::Error` past their own
/// boundary — both are folded in here via `From`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("range error: {0}")]
    Range(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::Authentication(_) => "AuthenticationError",
            AppError::Authorization(_) => "AuthorizationError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Conflict(_) => "ConflictError",
            AppError::Range(_) => "RangeError",
            AppError::Storage(_) => "StorageError",
            AppError::Io(_) => "IOError",
            AppError::Cancelled => "CancelledError",
            AppError::Internal(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Range(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::Error as E;
        match e {
            E::QueryReturnedNoRows => AppError::NotFound("row not found".into()),
            E::SqliteFailure(err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Conflict(msg.clone().unwrap_or_else(|| "constraint violation".into()))
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

/// Whether the full error message is safe to return to the client. Set
/// from `Config.dev_mode`; production responses for internal-ish errors
/// only ever carry a correlation ID.
pub static DEV_MODE: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let dev = DEV_MODE.load(std::sync::atomic::Ordering::Relaxed);

        let body = if matches!(self, AppError::Storage(_) | AppError::Internal(_)) && !dev {
            let correlation_id = Uuid::new_v4();
            error!(correlation_id = %correlation_id, error = %self, "internal error");
            json!({
                "error": self.kind(),
                "message": format!("internal error, correlation id {correlation_id}"),
            })
        } else {
            json!({ "error": self.kind(), "message": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
