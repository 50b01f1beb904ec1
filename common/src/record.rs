//! Ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::Username;
use crate::monetary::Amount;

/// Direction of a ledger entry relative to the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Balance increase.
    Credit,
    /// Balance decrease.
    Debit,
}

/// A single immutable entry in the transaction ledger.
///
/// For a fixed username, replaying the signed amounts in `id` order from an
/// initial balance of zero reproduces the account balance exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Store-assigned sequence number, monotonic across the ledger.
    pub id: u64,
    /// Account this entry belongs to.
    pub username: Username,
    /// Credit or debit.
    pub kind: EntryKind,
    /// Amount moved, always positive.
    pub amount: Amount,
    /// The account balance immediately after this entry was applied.
    pub resulting_balance: i64,
    /// When the entry was committed. Monotonic per store; `id` breaks ties.
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Get signed amount (positive for credit, negative for debit).
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            EntryKind::Credit => self.amount.minor_units(),
            EntryKind::Debit => -self.amount.minor_units(),
        }
    }
}

/// Replay records in application order from an initial balance.
///
/// Returns the final balance, or `None` if any intermediate
/// `resulting_balance` disagrees with the running total, which would mean
/// the ledger has a gap or an out-of-order application.
pub fn replay_balance(initial: i64, records: &[TransactionRecord]) -> Option<i64> {
    let mut balance = initial;
    for record in records {
        balance += record.signed_amount();
        if balance != record.resulting_balance {
            return None;
        }
    }
    Some(balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, kind: EntryKind, amount: i64, resulting: i64) -> TransactionRecord {
        TransactionRecord {
            id,
            username: Username::new("alice"),
            kind,
            amount: Amount::new(amount).unwrap(),
            resulting_balance: resulting,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_signed_amount() {
        assert_eq!(record(1, EntryKind::Credit, 100, 100).signed_amount(), 100);
        assert_eq!(record(2, EntryKind::Debit, 40, 60).signed_amount(), -40);
    }

    #[test]
    fn test_replay_consistent_ledger() {
        let records = vec![
            record(1, EntryKind::Credit, 1000, 1000),
            record(2, EntryKind::Debit, 300, 700),
            record(3, EntryKind::Credit, 50, 750),
        ];
        assert_eq!(replay_balance(0, &records), Some(750));
    }

    #[test]
    fn test_replay_detects_gap() {
        let records = vec![
            record(1, EntryKind::Credit, 1000, 1000),
            // Missing debit: resulting balance cannot follow from the prior one
            record(3, EntryKind::Credit, 50, 750),
        ];
        assert_eq!(replay_balance(0, &records), None);
    }

    #[test]
    fn test_entry_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntryKind::Credit).unwrap(), "\"credit\"");
        assert_eq!(serde_json::to_string(&EntryKind::Debit).unwrap(), "\"debit\"");
    }
}
