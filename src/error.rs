use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by repositories and aggregate operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// HTTP status for the boundary layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::InvalidReference(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Timeout(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidReference(_) => "INVALID_REFERENCE",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Database(_) | AppError::Timeout(_) | AppError::Internal(_) => {
                "STORAGE_FAILURE"
            }
        }
    }

    /// True for conditions that are caused by the caller rather than the store.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_) | AppError::Timeout(_) | AppError::Internal(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict(describe_constraint(db_err.as_ref()));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::InvalidReference(describe_constraint(db_err.as_ref()));
            }
            if db_err.is_check_violation() {
                return AppError::InvalidInput(describe_constraint(db_err.as_ref()));
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(errors.to_string())
    }
}

fn describe_constraint(db_err: &dyn sqlx::error::DatabaseError) -> String {
    match db_err.constraint() {
        Some(constraint) => format!("{} ({})", db_err.message(), constraint),
        None => db_err.message().to_string(),
    }
}
