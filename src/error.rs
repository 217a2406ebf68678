use axum::http::StatusCode;
use std::fmt::Display;
use uuid::Uuid;

/// Failure of a single upstream adapter call (detector or oracle).
/// Always recoverable: the fusion engine degrades instead of aborting.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source_name}: {message}")]
pub struct AdapterError {
    pub source_name: &'static str,
    pub message: String,
}

impl AdapterError {
    pub fn new(source_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            source_name,
            message: message.into(),
        }
    }

    pub fn timed_out(source_name: &'static str, seconds: u64) -> Self {
        Self::new(source_name, format!("timed out after {seconds}s"))
    }
}

/// Failures of a whole check cycle or of a registry/history operation.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{0}")]
    Validation(String),
    #[error("check already in progress for location {0}")]
    CheckInProgress(Uuid),
    #[error("location not found or monitoring disabled")]
    LocationUnavailable,
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl CheckError {
    pub fn status(&self) -> StatusCode {
        match self {
            CheckError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckError::CheckInProgress(_) => StatusCode::CONFLICT,
            CheckError::LocationUnavailable => StatusCode::NOT_FOUND,
            CheckError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn map_check_error(err: CheckError) -> (StatusCode, String) {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "check cycle failed");
        (status, "Internal server error".to_string())
    } else {
        (status, err.to_string())
    }
}

pub fn internal_error(err: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

pub fn map_db_error(err: sqlx::Error) -> (StatusCode, String) {
    let status = match &err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => StatusCode::CONFLICT,    // unique_violation
            Some("23503") => StatusCode::BAD_REQUEST, // foreign_key_violation
            Some("23502") => StatusCode::BAD_REQUEST, // not_null_violation
            Some("22P02") => StatusCode::BAD_REQUEST, // invalid_text_representation
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!(error = %err, status = %status, "database error");

    let message = match status {
        StatusCode::NOT_FOUND => "Resource not found",
        StatusCode::CONFLICT => "Resource already exists",
        StatusCode::BAD_REQUEST => "Invalid request",
        _ => "Database error",
    };

    (status, message.to_string())
}
