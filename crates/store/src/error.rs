//! Store error model and sqlx error mapping.

use thiserror::Error;

use bankd_core::BankError;

/// Error raised by a [`crate::LedgerStore`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique violation or serialization failure; the operation raced a
    /// concurrent writer and may be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The targeted entry is missing or already holds a terminal status.
    #[error("entry missing or already finalized")]
    EntryNotFinalizable,

    /// Balance/rate field failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// Any other database failure (connectivity, constraint, syntax).
    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },
}

impl StoreError {
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}

impl From<StoreError> for BankError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => BankError::Conflict(msg),
            other => BankError::store(other.to_string()),
        }
    }
}

/// Map a sqlx error to a [`StoreError`], switching on the SQLSTATE code.
///
/// `23505` (unique violation) and `40001` (serialization failure) surface as
/// `Conflict`; everything else is a plain database error tagged with the
/// operation that hit it.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") => StoreError::Conflict(message),
                _ => StoreError::database(operation, message),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::database(operation, "connection pool closed")
        }
        other => StoreError::database(operation, other.to_string()),
    }
}
