use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl LedgerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Internal { message } => message,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<DbErr> for LedgerError {
    fn from(value: DbErr) -> Self {
        match value.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => LedgerError::conflict(detail),
            _ => LedgerError::internal(value.to_string()),
        }
    }
}
