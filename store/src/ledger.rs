//! Ledger store: per-user, append-only transaction history.

use std::sync::Arc;

use walletd_common::{TransactionRecord, Username};

use crate::database::Database;

/// Store view for the transaction ledger.
///
/// Appends only happen inside [`Database::commit`], in the same atomic unit
/// as the account mutation each record documents; this view is read-only.
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<Database>,
}

impl LedgerStore {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All records for a user, most recent first.
    pub fn list_by_user(&self, username: &Username) -> Vec<TransactionRecord> {
        self.db.with_inner(|inner| {
            let mut records: Vec<TransactionRecord> = inner
                .entries
                .iter()
                .filter(|r| &r.username == username)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.id.cmp(&a.id));
            records
        })
    }

    /// Number of records across all users.
    pub fn len(&self) -> usize {
        self.db.with_inner(|inner| inner.entries.len())
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
