//! Account state and store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use walletd_common::{Result, Username, WalletError};

use crate::database::Database;

/// A wallet account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique, immutable account key.
    pub username: Username,
    /// Opaque credential hash set at registration. Never read back as
    /// plaintext; only compared through the credential verifier.
    pub credential_hash: String,
    /// Balance in minor currency units. Never negative.
    pub balance: i64,
    /// Monotonically increasing version for optimistic concurrency.
    pub version: u64,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Check if the account can cover the given number of minor units.
    pub fn has_sufficient_funds(&self, minor_units: i64) -> bool {
        self.balance >= minor_units
    }
}

/// Store view for accounts.
///
/// `compare_and_set` is the only mutation path for balances: it succeeds
/// only when the stored version matches the caller's expectation, which is
/// what prevents lost updates when two operations race on one account.
#[derive(Clone)]
pub struct AccountStore {
    db: Arc<Database>,
}

impl AccountStore {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new account with a zero balance.
    ///
    /// Fails with `InvalidInput` if the username is already taken.
    pub fn register(&self, username: Username, credential_hash: String) -> Result<Account> {
        self.db.with_inner(|inner| {
            if inner.accounts.contains_key(&username) {
                return Err(WalletError::InvalidInput(
                    "user exists or invalid input".to_string(),
                ));
            }
            let account = Account {
                username: username.clone(),
                credential_hash,
                balance: 0,
                version: 0,
                created_at: Utc::now(),
            };
            inner.accounts.insert(username.clone(), account.clone());
            debug!(username = %username, "account registered");
            Ok(account)
        })
    }

    /// Get a snapshot of an account.
    pub fn get(&self, username: &Username) -> Result<Account> {
        self.db.with_inner(|inner| {
            inner
                .accounts
                .get(username)
                .cloned()
                .ok_or_else(|| WalletError::NotFound(username.to_string()))
        })
    }

    /// Atomically write a new balance if the stored version still matches.
    ///
    /// On success the version is incremented and the fresh snapshot
    /// returned. On a version mismatch the caller must re-read and retry.
    pub fn compare_and_set(
        &self,
        username: &Username,
        expected_version: u64,
        new_balance: i64,
    ) -> Result<Account> {
        if new_balance < 0 {
            return Err(WalletError::PersistenceFailure(format!(
                "refusing negative balance for {username}"
            )));
        }
        self.db.with_inner(|inner| {
            let account = inner
                .accounts
                .get_mut(username)
                .ok_or_else(|| WalletError::NotFound(username.to_string()))?;
            if account.version != expected_version {
                debug!(
                    username = %username,
                    expected = expected_version,
                    actual = account.version,
                    "compare-and-set conflict"
                );
                return Err(WalletError::ConflictRetryable {
                    username: username.clone(),
                });
            }
            account.balance = new_balance;
            account.version += 1;
            Ok(account.clone())
        })
    }
}
