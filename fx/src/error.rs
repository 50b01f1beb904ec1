//! FX error types.

use thiserror::Error;

use walletd_common::Currency;

/// Errors that can occur during rate lookup or conversion.
#[derive(Debug, Error)]
pub enum FxError {
    /// The rate source has no rate for the requested currency.
    #[error("Rate not available for {0}")]
    RateNotAvailable(Currency),

    /// The rate source was unreachable or returned a malformed response.
    #[error("Rate provider error: {0}")]
    Provider(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
