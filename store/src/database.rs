//! The shared wallet database and its transactional boundary.
//!
//! All balance mutations and their paired ledger appends go through
//! [`Database::commit`], which applies an [`AtomicUnit`] inside one critical
//! section: version checks, balance writes, and record appends become
//! visible together or not at all. The handle is passed explicitly into the
//! store views; there is no process-wide singleton.

use std::cmp;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use walletd_common::{
    Amount, EntryKind, Result, TransactionRecord, Username, WalletError,
};

use crate::accounts::{Account, AccountStore};
use crate::ledger::LedgerStore;

/// One account mutation within an atomic unit.
///
/// Succeeds only if the stored version still equals `expected_version`.
#[derive(Debug, Clone)]
pub struct AccountWrite {
    /// Account to mutate.
    pub username: Username,
    /// Version observed when the new balance was computed.
    pub expected_version: u64,
    /// Balance to write. Must be non-negative.
    pub new_balance: i64,
}

/// One ledger record to append within an atomic unit.
///
/// `id` and `timestamp` are assigned by the store at commit time.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    /// Account the entry belongs to.
    pub username: Username,
    /// Credit or debit.
    pub kind: EntryKind,
    /// Amount moved.
    pub amount: Amount,
    /// Balance the paired write leaves on the account.
    pub resulting_balance: i64,
}

/// A set of account writes and paired ledger records that must become
/// visible together.
#[derive(Debug, Clone, Default)]
pub struct AtomicUnit {
    writes: Vec<AccountWrite>,
    records: Vec<PendingRecord>,
}

impl AtomicUnit {
    /// Create an empty unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one leg: an account write and its paired ledger record.
    pub fn push_leg(&mut self, write: AccountWrite, record: PendingRecord) {
        self.writes.push(write);
        self.records.push(record);
    }

    /// Number of legs in the unit.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Check if the unit has no legs.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Verify the 1:1 pairing invariant: every write has exactly one record
    /// for the same account whose resulting balance matches the write.
    fn is_paired(&self) -> bool {
        self.writes.len() == self.records.len()
            && self.writes.iter().zip(&self.records).all(|(w, r)| {
                w.username == r.username && w.new_balance == r.resulting_balance
            })
    }
}

/// Result of a committed unit: fresh account snapshots and the appended
/// records, in the order the legs were applied.
#[derive(Debug, Clone)]
pub struct CommittedUnit {
    pub accounts: Vec<Account>,
    pub records: Vec<TransactionRecord>,
}

impl CommittedUnit {
    /// Look up the committed balance of one of the involved accounts.
    pub fn balance_of(&self, username: &Username) -> Option<i64> {
        self.accounts
            .iter()
            .find(|a| &a.username == username)
            .map(|a| a.balance)
    }
}

pub(crate) struct DbInner {
    pub(crate) accounts: HashMap<Username, Account>,
    pub(crate) entries: Vec<TransactionRecord>,
    next_entry_id: u64,
    last_timestamp: DateTime<Utc>,
    #[cfg(any(test, feature = "test-utils"))]
    fail_next_append: bool,
}

/// The in-memory wallet database.
///
/// A single mutex guards accounts and ledger together so that a multi-leg
/// commit can check and mutate several keys atomically. Critical sections
/// are short and never held across an await point.
pub struct Database {
    inner: Mutex<DbInner>,
}

impl Database {
    /// Create an empty database.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DbInner {
                accounts: HashMap::new(),
                entries: Vec::new(),
                next_entry_id: 1,
                last_timestamp: DateTime::<Utc>::MIN_UTC,
                #[cfg(any(test, feature = "test-utils"))]
                fail_next_append: false,
            }),
        }
    }

    /// Account store view over this database.
    pub fn accounts(self: &Arc<Self>) -> AccountStore {
        AccountStore::new(Arc::clone(self))
    }

    /// Ledger store view over this database.
    pub fn ledger(self: &Arc<Self>) -> LedgerStore {
        LedgerStore::new(Arc::clone(self))
    }

    /// Atomically apply an [`AtomicUnit`].
    ///
    /// Legs are applied in lexicographic username order regardless of the
    /// order they were pushed, so concurrent multi-account operations always
    /// touch accounts in the same total order. Any version mismatch aborts
    /// the whole unit with `ConflictRetryable` before any write is applied;
    /// a failure between applying writes and appending records rolls the
    /// writes back.
    pub fn commit(&self, unit: AtomicUnit) -> Result<CommittedUnit> {
        if unit.is_empty() || !unit.is_paired() {
            return Err(WalletError::PersistenceFailure(
                "atomic unit is empty or unpaired".to_string(),
            ));
        }

        // Fixed total order across all committers.
        let mut order: Vec<usize> = (0..unit.len()).collect();
        order.sort_by(|&a, &b| unit.writes[a].username.cmp(&unit.writes[b].username));

        // One write per account: a second write would silently bypass the
        // version check the first one just consumed.
        for pair in order.windows(2) {
            if unit.writes[pair[0]].username == unit.writes[pair[1]].username {
                return Err(WalletError::PersistenceFailure(
                    "duplicate account in atomic unit".to_string(),
                ));
            }
        }

        let mut inner = self.inner.lock();

        // Validate every leg before touching anything.
        for &i in &order {
            let write = &unit.writes[i];
            let account = inner
                .accounts
                .get(&write.username)
                .ok_or_else(|| WalletError::NotFound(write.username.to_string()))?;
            if account.version != write.expected_version {
                debug!(
                    username = %write.username,
                    expected = write.expected_version,
                    actual = account.version,
                    "version conflict, unit aborted"
                );
                return Err(WalletError::ConflictRetryable {
                    username: write.username.clone(),
                });
            }
            if write.new_balance < 0 {
                return Err(WalletError::PersistenceFailure(format!(
                    "refusing negative balance for {}",
                    write.username
                )));
            }
        }

        // Apply balance writes, keeping enough state to undo them.
        let mut undo: Vec<(Username, i64, u64)> = Vec::with_capacity(unit.len());
        for &i in &order {
            let write = &unit.writes[i];
            let account = inner
                .accounts
                .get_mut(&write.username)
                .expect("validated above");
            undo.push((write.username.clone(), account.balance, account.version));
            account.balance = write.new_balance;
            account.version += 1;
        }

        // Append the paired records. If the append cannot proceed, the
        // applied writes are rolled back and nothing becomes visible.
        if self.append_should_fail(&mut inner) {
            for (username, balance, version) in undo {
                let account = inner.accounts.get_mut(&username).expect("undo target");
                account.balance = balance;
                account.version = version;
            }
            warn!("ledger append failed, unit rolled back");
            return Err(WalletError::PersistenceFailure(
                "ledger append failed".to_string(),
            ));
        }

        let timestamp = cmp::max(Utc::now(), inner.last_timestamp);
        inner.last_timestamp = timestamp;

        let mut committed = CommittedUnit {
            accounts: Vec::with_capacity(unit.len()),
            records: Vec::with_capacity(unit.len()),
        };
        for &i in &order {
            let pending = unit.records[i].clone();
            let id = inner.next_entry_id;
            inner.next_entry_id += 1;
            let record = TransactionRecord {
                id,
                username: pending.username,
                kind: pending.kind,
                amount: pending.amount,
                resulting_balance: pending.resulting_balance,
                timestamp,
            };
            inner.entries.push(record.clone());
            committed.records.push(record);
        }
        for &i in &order {
            let account = inner
                .accounts
                .get(&unit.writes[i].username)
                .expect("applied above");
            committed.accounts.push(account.clone());
        }

        Ok(committed)
    }

    #[cfg(any(test, feature = "test-utils"))]
    fn append_should_fail(&self, inner: &mut DbInner) -> bool {
        std::mem::take(&mut inner.fail_next_append)
    }

    #[cfg(not(any(test, feature = "test-utils")))]
    fn append_should_fail(&self, _inner: &mut DbInner) -> bool {
        false
    }

    /// Make the next commit fail between applying balance writes and
    /// appending ledger records, to exercise the rollback path.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fail_next_append(&self) {
        self.inner.lock().fail_next_append = true;
    }

    pub(crate) fn with_inner<T>(&self, f: impl FnOnce(&mut DbInner) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
