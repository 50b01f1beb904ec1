//! Error types for walletd operations.

use thiserror::Error;

use crate::identifiers::Username;

/// Main error type for wallet operations.
///
/// The variants form the complete failure taxonomy of the service; callers
/// branch on the variant, never on a panic or an exception-style payload.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Missing or invalid credentials. Deliberately carries no detail about
    /// whether the user exists.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed or out-of-range request field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Business-rule failure: the paying account cannot cover the amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Missing account or product.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency collision on an account version. Retried
    /// internally; only surfaces once the retry budget is exhausted.
    #[error("Concurrent update conflict on account {username}")]
    ConflictRetryable { username: Username },

    /// Catalog or rate lookup unreachable or malformed.
    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    /// Store unavailable; the operation was aborted with no partial state.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl WalletError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::ConflictRetryable { .. })
    }

    /// Get error code for responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::Unauthorized => "UNAUTHORIZED",
            WalletError::InvalidInput(_) => "INVALID_INPUT",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::NotFound(_) => "NOT_FOUND",
            WalletError::ConflictRetryable { .. } => "CONFLICT",
            WalletError::ExternalServiceFailure(_) => "EXTERNAL_SERVICE_FAILURE",
            WalletError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }
}

/// Result type alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(WalletError::ConflictRetryable {
            username: Username::new("alice")
        }
        .is_retryable());
        assert!(!WalletError::InsufficientFunds {
            required: 100,
            available: 0
        }
        .is_retryable());
        assert!(!WalletError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_unauthorized_is_opaque() {
        // The display string must not leak which check failed
        assert_eq!(WalletError::Unauthorized.to_string(), "Unauthorized");
    }
}
