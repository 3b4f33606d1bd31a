//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE raised when one `INSERT … ON CONFLICT` touches the same row twice.
const CARDINALITY_VIOLATION: &str = "21000";

/// Rejected client input. Never corrected silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' cannot be sorted")]
    NotSortable(String),

    #[error("field '{0}' cannot be filtered")]
    NotFilterable(String),

    #[error("unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("operator '{operator}' is not allowed for field '{field}'")]
    OperatorNotAllowed { field: String, operator: String },

    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown sort direction '{0}'")]
    UnknownDirection(String),

    #[error("offset must be zero or greater (got {0})")]
    OffsetOutOfRange(i64),

    #[error("limit must be between 1 and {max} (got {limit})")]
    LimitOutOfRange { limit: i64, max: u64 },

    /// Query string or body that could not be decoded at all.
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },

    /// A write rejected by a uniqueness or referential constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The data or the composer broke a guarantee the data model makes.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            let cardinality = db.code().as_deref() == Some(CARDINALITY_VIOLATION);
            if db.is_unique_violation() || db.is_foreign_key_violation() || cardinality {
                return AppError::Conflict(db.message().to_string());
            }
        }
        AppError::Database(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Invariant(_) | AppError::Internal(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Invariant(_) => "INVARIANT_VIOLATION",
            AppError::Internal(_) | AppError::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Server-side failures are logged in full and returned vaguely.
        let error = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::Invariant(msg) => {
                tracing::error!(error = %msg, "invariant violated");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error, code })).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
