//! Service-wide error taxonomy.

use thiserror::Error;

/// Result type used across the business layers.
pub type BankResult<T> = Result<T, BankError>;

/// Error returned by the ledger engine and its collaborators.
///
/// Business-rule violations (insufficient balance, out-of-range input) are
/// distinct from infrastructure failures so the HTTP layer can map each
/// category to its own status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Unknown user or account.
    #[error("not found: {0}")]
    NotFound(String),

    /// A withdrawal exceeded the account balance.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Input failed a business invariant (amount/rate bounds, malformed field).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// The caller is authenticated but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// A write raced with a concurrent one (unique violation, serialization failure).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is being rate limited.
    #[error("too many requests")]
    TooManyRequests,

    /// Store/infrastructure failure (connectivity, codec, transaction scope).
    #[error("store error: {0}")]
    Store(String),
}

impl BankError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::Unprocessable(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// True for failures the caller can correct (as opposed to retrying).
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InsufficientBalance
                | Self::Unprocessable(_)
                | Self::Forbidden(_)
        )
    }
}
