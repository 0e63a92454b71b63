use thiserror::Error;

use crate::shared::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    #[error("Guest not found: {0}")]
    GuestNotFound(String),

    #[error("Guest {0} has already checked out")]
    AlreadySettled(i32),

    /// The transaction rolled back; retrying with a fresh preview is safe
    #[error("Settlement transaction failed: {0}")]
    SettlementFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::GuestNotFound(msg) => AppError::NotFound(msg),
            err @ SettlementError::AlreadySettled(_) => AppError::Conflict(err.to_string()),
            SettlementError::SettlementFailed(msg) => AppError::SettlementFailed(msg),
            SettlementError::Storage(msg) => AppError::DatabaseError(msg),
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        SettlementError::Storage(err.to_string())
    }
}
