//! The authentication gate.

use tracing::debug;

use walletd_common::{Result, WalletError};
use walletd_store::{Account, AccountStore};

use crate::credentials::Credentials;
use crate::hash::verify_password;

/// Verifies presented credentials against the account store.
///
/// Every failure path collapses to `Unauthorized`: an absent user and a
/// wrong password are indistinguishable to the caller, which keeps
/// usernames unenumerable.
#[derive(Clone)]
pub struct AuthGate {
    accounts: AccountStore,
}

impl AuthGate {
    /// Create a gate over the given account store.
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }

    /// Authenticate credentials and return the account on success.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Account> {
        let account = match self.accounts.get(&credentials.username) {
            Ok(account) => account,
            Err(_) => {
                debug!("authentication failed: unknown user");
                return Err(WalletError::Unauthorized);
            }
        };

        if !verify_password(&credentials.password, &account.credential_hash) {
            debug!(username = %account.username, "authentication failed: bad credential");
            return Err(WalletError::Unauthorized);
        }

        Ok(account)
    }
}
