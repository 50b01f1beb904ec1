//! Monetary types for walletd.
//!
//! Balances and transfer amounts are integer minor currency units (paise),
//! which keeps ledger arithmetic exact. Fractional math only appears at the
//! currency-conversion boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WalletError;

/// A positive transfer amount in minor currency units.
///
/// Construction validates positivity, so a held `Amount` is always usable as
/// a credit or debit without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Create an amount, rejecting zero and negative values.
    pub fn new(minor_units: i64) -> Result<Self, WalletError> {
        if minor_units <= 0 {
            return Err(WalletError::InvalidInput(format!(
                "amount must be a positive integer, got {minor_units}"
            )));
        }
        Ok(Self(minor_units))
    }

    /// Get the value in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Add an amount to a balance, guarding against overflow.
pub fn credit_balance(balance: i64, amount: Amount) -> Result<i64, WalletError> {
    balance
        .checked_add(amount.minor_units())
        .ok_or_else(|| WalletError::InvalidInput("balance overflow".to_string()))
}

/// Subtract an amount from a balance. The caller is expected to have checked
/// sufficiency; a negative result is still refused here.
pub fn debit_balance(balance: i64, amount: Amount) -> Result<i64, WalletError> {
    let new_balance = balance - amount.minor_units();
    if new_balance < 0 {
        return Err(WalletError::InsufficientFunds {
            required: amount.minor_units(),
            available: balance,
        });
    }
    Ok(new_balance)
}

/// ISO 4217-style currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Validate the code format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 8
            && self.0.chars().all(|c| c.is_ascii_alphabetic())
    }

    /// The base currency all balances are held in.
    pub fn inr() -> Self {
        Self::new("INR")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_rejects_non_positive() {
        assert!(Amount::new(0).is_err());
        assert!(Amount::new(-5).is_err());
        assert_eq!(Amount::new(100).unwrap().minor_units(), 100);
    }

    #[test]
    fn test_credit_and_debit() {
        let amt = Amount::new(300).unwrap();
        assert_eq!(credit_balance(700, amt).unwrap(), 1000);
        assert_eq!(debit_balance(1000, amt).unwrap(), 700);
    }

    #[test]
    fn test_debit_refuses_negative_result() {
        let amt = Amount::new(5000).unwrap();
        let err = debit_balance(700, amt).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_credit_overflow() {
        let amt = Amount::new(1).unwrap();
        assert!(credit_balance(i64::MAX, amt).is_err());
    }

    #[test]
    fn test_currency_normalization() {
        let c = Currency::new("usd");
        assert_eq!(c.code(), "USD");
        assert!(c.is_valid());
        assert!(!Currency::new("US2").is_valid());
        assert!(!Currency::new("").is_valid());
    }
}
