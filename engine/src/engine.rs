//! Core transfer engine implementation.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use walletd_common::{
    credit_balance, debit_balance, Amount, EntryKind, ProductId, Result, TransactionRecord,
    Transfer, TransferId, TransferPhase, Username, WalletError,
};
use walletd_store::{Account, AccountStore, AccountWrite, AtomicUnit, Database, PendingRecord};

use crate::catalog::Catalog;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many times a conflicted operation is re-run from Validate before
    /// the conflict surfaces to the caller.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_retries: 8 }
    }
}

/// Result of a committed transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Identifier of the operation.
    pub transfer_id: TransferId,
    /// Committed balance of the initiating account.
    pub balance: i64,
    /// Ledger records appended by the operation.
    pub records: Vec<TransactionRecord>,
}

/// The transfer engine.
///
/// Every operation runs Validate → Apply → Record → Commit. Business-rule
/// failures are raised during Validate without touching any store; version
/// conflicts restart the operation with freshly read balances.
pub struct TransferEngine {
    db: Arc<Database>,
    accounts: AccountStore,
    catalog: Arc<dyn Catalog>,
    config: EngineConfig,
}

impl TransferEngine {
    /// Create an engine over the given database and catalog.
    pub fn new(db: Arc<Database>, catalog: Arc<dyn Catalog>, config: EngineConfig) -> Self {
        let accounts = db.accounts();
        Self {
            db,
            accounts,
            catalog,
            config,
        }
    }

    /// Credit an account with new funds. No source account is debited.
    #[instrument(skip(self, account), fields(username = %account.username, amount = %amount))]
    pub async fn fund(&self, account: &Account, amount: Amount) -> Result<TransferOutcome> {
        let outcome = self
            .run_single_leg(&account.username, EntryKind::Credit, amount)
            .await?;
        info!(
            transfer_id = %outcome.transfer_id,
            balance = outcome.balance,
            "fund committed"
        );
        Ok(outcome)
    }

    /// Transfer funds from `sender` to `to`.
    ///
    /// Both legs and both ledger records commit as one unit; total value
    /// across the pair is conserved.
    #[instrument(skip(self, sender), fields(from = %sender.username, to = %to, amount = %amount))]
    pub async fn pay(
        &self,
        sender: &Account,
        to: &Username,
        amount: Amount,
    ) -> Result<TransferOutcome> {
        if &sender.username == to {
            return Err(WalletError::InvalidInput(
                "cannot pay your own account".to_string(),
            ));
        }

        let mut transfer = Transfer::begin();
        while transfer.attempts <= self.config.max_retries {
            // Validate: fresh reads, business checks, no store writes.
            let sender_now = self.accounts.get(&sender.username)?;
            let recipient = self
                .accounts
                .get(to)
                .map_err(|_| WalletError::NotFound(format!("recipient {to}")))?;

            if !sender_now.has_sufficient_funds(amount.minor_units()) {
                transfer.abort();
                return Err(WalletError::InsufficientFunds {
                    required: amount.minor_units(),
                    available: sender_now.balance,
                });
            }

            let sender_balance = debit_balance(sender_now.balance, amount)?;
            let recipient_balance = credit_balance(recipient.balance, amount)?;

            let mut unit = AtomicUnit::new();
            unit.push_leg(
                account_write(&sender_now, sender_balance),
                pending_record(&sender_now, EntryKind::Debit, amount, sender_balance),
            );
            unit.push_leg(
                account_write(&recipient, recipient_balance),
                pending_record(&recipient, EntryKind::Credit, amount, recipient_balance),
            );

            match self.try_commit(&mut transfer, unit)? {
                CommitAttempt::Committed(records) => {
                    info!(
                        transfer_id = %transfer.id,
                        sender_balance,
                        recipient_balance,
                        "pay committed"
                    );
                    return Ok(TransferOutcome {
                        transfer_id: transfer.id,
                        balance: sender_balance,
                        records,
                    });
                }
                CommitAttempt::Conflicted => continue,
            }
        }

        self.retries_exhausted(transfer, &sender.username)
    }

    /// Debit an account for a catalog product.
    #[instrument(skip(self, buyer), fields(username = %buyer.username, product_id = %product_id))]
    pub async fn purchase(&self, buyer: &Account, product_id: ProductId) -> Result<TransferOutcome> {
        let product = self
            .catalog
            .lookup(&product_id)
            .await
            .ok_or_else(|| WalletError::NotFound(format!("product {product_id}")))?;

        let outcome = self
            .run_single_leg(&buyer.username, EntryKind::Debit, product.price)
            .await?;
        info!(
            transfer_id = %outcome.transfer_id,
            product_id = %product_id,
            balance = outcome.balance,
            "purchase committed"
        );
        Ok(outcome)
    }

    /// Shared Validate → commit loop for single-account operations.
    async fn run_single_leg(
        &self,
        username: &Username,
        kind: EntryKind,
        amount: Amount,
    ) -> Result<TransferOutcome> {
        let mut transfer = Transfer::begin();
        while transfer.attempts <= self.config.max_retries {
            let account = self.accounts.get(username)?;

            let new_balance = match kind {
                EntryKind::Credit => credit_balance(account.balance, amount)?,
                EntryKind::Debit => {
                    if !account.has_sufficient_funds(amount.minor_units()) {
                        transfer.abort();
                        return Err(WalletError::InsufficientFunds {
                            required: amount.minor_units(),
                            available: account.balance,
                        });
                    }
                    debit_balance(account.balance, amount)?
                }
            };

            let mut unit = AtomicUnit::new();
            unit.push_leg(
                account_write(&account, new_balance),
                pending_record(&account, kind, amount, new_balance),
            );

            match self.try_commit(&mut transfer, unit)? {
                CommitAttempt::Committed(records) => {
                    return Ok(TransferOutcome {
                        transfer_id: transfer.id,
                        balance: new_balance,
                        records,
                    });
                }
                CommitAttempt::Conflicted => continue,
            }
        }

        self.retries_exhausted(transfer, username)
    }

    /// Drive one unit through Apply/Record/Commit, restarting the transfer
    /// on a version conflict.
    fn try_commit(&self, transfer: &mut Transfer, unit: AtomicUnit) -> Result<CommitAttempt> {
        advance(transfer, TransferPhase::Applying)?;
        match self.db.commit(unit) {
            Ok(committed) => {
                advance(transfer, TransferPhase::Recording)?;
                advance(transfer, TransferPhase::Committed)?;
                Ok(CommitAttempt::Committed(committed.records))
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    transfer_id = %transfer.id,
                    attempt = transfer.attempts,
                    "commit conflicted, retrying from validate"
                );
                transfer.restart();
                Ok(CommitAttempt::Conflicted)
            }
            Err(e) => {
                transfer.abort();
                Err(e)
            }
        }
    }

    fn retries_exhausted(&self, mut transfer: Transfer, username: &Username) -> Result<TransferOutcome> {
        transfer.abort();
        warn!(
            transfer_id = %transfer.id,
            attempts = transfer.attempts,
            username = %username,
            "retry budget exhausted"
        );
        Err(WalletError::ConflictRetryable {
            username: username.clone(),
        })
    }
}

enum CommitAttempt {
    Committed(Vec<TransactionRecord>),
    Conflicted,
}

fn advance(transfer: &mut Transfer, phase: TransferPhase) -> Result<()> {
    transfer
        .transition_to(phase)
        .map_err(|e| WalletError::PersistenceFailure(e.to_string()))
}

fn account_write(account: &Account, new_balance: i64) -> AccountWrite {
    AccountWrite {
        username: account.username.clone(),
        expected_version: account.version,
        new_balance,
    }
}

fn pending_record(
    account: &Account,
    kind: EntryKind,
    amount: Amount,
    resulting_balance: i64,
) -> PendingRecord {
    PendingRecord {
        username: account.username.clone(),
        kind,
        amount,
        resulting_balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletd_common::replay_balance;
    use walletd_store::ProductStore;

    struct Harness {
        db: Arc<Database>,
        catalog: Arc<ProductStore>,
        engine: Arc<TransferEngine>,
    }

    fn harness() -> Harness {
        harness_with(EngineConfig::default())
    }

    fn harness_with(config: EngineConfig) -> Harness {
        let db = Arc::new(Database::new());
        let catalog = Arc::new(ProductStore::new());
        let engine = Arc::new(TransferEngine::new(db.clone(), catalog.clone(), config));
        Harness {
            db,
            catalog,
            engine,
        }
    }

    fn register(h: &Harness, name: &str) -> Account {
        h.db.accounts()
            .register(Username::new(name), "hash".to_string())
            .unwrap()
    }

    fn amt(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    fn ascending_records(h: &Harness, username: &Username) -> Vec<TransactionRecord> {
        let mut records = h.db.ledger().list_by_user(username);
        records.reverse();
        records
    }

    #[tokio::test]
    async fn test_fund_credits_and_records() {
        // Scenario A
        let h = harness();
        let alice = register(&h, "alice");

        let outcome = h.engine.fund(&alice, amt(1000)).await.unwrap();

        assert_eq!(outcome.balance, 1000);
        let records = h.db.ledger().list_by_user(&alice.username);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, EntryKind::Credit);
        assert_eq!(records[0].amount, amt(1000));
        assert_eq!(records[0].resulting_balance, 1000);
    }

    #[tokio::test]
    async fn test_pay_conserves_value() {
        // Scenario B
        let h = harness();
        let alice = register(&h, "alice");
        let bob = register(&h, "bob");
        h.engine.fund(&alice, amt(1000)).await.unwrap();

        let alice = h.db.accounts().get(&alice.username).unwrap();
        let outcome = h.engine.pay(&alice, &bob.username, amt(300)).await.unwrap();

        assert_eq!(outcome.balance, 700);
        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 700);
        assert_eq!(h.db.accounts().get(&bob.username).unwrap().balance, 300);

        let alice_records = h.db.ledger().list_by_user(&alice.username);
        assert_eq!(alice_records[0].kind, EntryKind::Debit);
        assert_eq!(alice_records[0].amount, amt(300));
        assert_eq!(alice_records[0].resulting_balance, 700);

        let bob_records = h.db.ledger().list_by_user(&bob.username);
        assert_eq!(bob_records.len(), 1);
        assert_eq!(bob_records[0].kind, EntryKind::Credit);
        assert_eq!(bob_records[0].resulting_balance, 300);
    }

    #[tokio::test]
    async fn test_pay_insufficient_funds_leaves_no_trace() {
        // Scenario C
        let h = harness();
        let alice = register(&h, "alice");
        let bob = register(&h, "bob");
        h.engine.fund(&alice, amt(700)).await.unwrap();

        let alice = h.db.accounts().get(&alice.username).unwrap();
        let err = h
            .engine
            .pay(&alice, &bob.username, amt(5000))
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 700);
        assert_eq!(h.db.accounts().get(&bob.username).unwrap().balance, 0);
        assert_eq!(h.db.ledger().list_by_user(&alice.username).len(), 1);
        assert!(h.db.ledger().list_by_user(&bob.username).is_empty());
    }

    #[tokio::test]
    async fn test_pay_unknown_recipient() {
        let h = harness();
        let alice = register(&h, "alice");
        h.engine.fund(&alice, amt(1000)).await.unwrap();

        let alice = h.db.accounts().get(&alice.username).unwrap();
        let err = h
            .engine
            .pay(&alice, &Username::new("ghost"), amt(100))
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::NotFound(_)));
        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 1000);
    }

    #[tokio::test]
    async fn test_pay_self_rejected() {
        let h = harness();
        let alice = register(&h, "alice");
        h.engine.fund(&alice, amt(1000)).await.unwrap();

        let err = h
            .engine
            .pay(&alice, &alice.username, amt(100))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_purchase_debits_price() {
        let h = harness();
        let alice = register(&h, "alice");
        h.engine.fund(&alice, amt(700)).await.unwrap();
        let product = h
            .catalog
            .insert("Widget".to_string(), amt(500), "A widget".to_string());

        let outcome = h.engine.purchase(&alice, product.id).await.unwrap();

        assert_eq!(outcome.balance, 200);
        let records = h.db.ledger().list_by_user(&alice.username);
        assert_eq!(records[0].kind, EntryKind::Debit);
        assert_eq!(records[0].amount, amt(500));
    }

    #[tokio::test]
    async fn test_purchase_insufficient_funds() {
        // Scenario D
        let h = harness();
        let alice = register(&h, "alice");
        h.engine.fund(&alice, amt(700)).await.unwrap();
        let product = h
            .catalog
            .insert("Rug".to_string(), amt(1200), String::new());

        let err = h.engine.purchase(&alice, product.id).await.unwrap_err();

        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 700);
        assert_eq!(h.db.ledger().list_by_user(&alice.username).len(), 1);
    }

    #[tokio::test]
    async fn test_purchase_unknown_product() {
        let h = harness();
        let alice = register(&h, "alice");
        h.engine.fund(&alice, amt(700)).await.unwrap();

        let err = h
            .engine
            .purchase(&alice, ProductId::new(42))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fund_is_never_partially_applied() {
        let h = harness();
        let alice = register(&h, "alice");

        h.db.fail_next_append();
        let err = h.engine.fund(&alice, amt(500)).await.unwrap_err();

        // The balance write was rolled back with the failed append: neither
        // the mutation nor the record is visible.
        assert!(matches!(err, WalletError::PersistenceFailure(_)));
        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 0);
        assert!(h.db.ledger().list_by_user(&alice.username).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_funds_both_apply() {
        // Scenario E
        let h = harness();
        let alice = register(&h, "alice");

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = h.engine.clone();
            let account = alice.clone();
            handles.push(tokio::spawn(async move {
                engine.fund(&account, amt(100)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(h.db.accounts().get(&alice.username).unwrap().balance, 200);

        let mut resulting: Vec<i64> = h
            .db
            .ledger()
            .list_by_user(&alice.username)
            .iter()
            .map(|r| r.resulting_balance)
            .collect();
        resulting.sort_unstable();
        assert_eq!(resulting, vec![100, 200]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposing_transfers_conserve_value() {
        // A wide retry budget keeps heavy same-pair contention from
        // exhausting any single operation.
        let h = harness_with(EngineConfig { max_retries: 64 });
        let alice = register(&h, "alice");
        let bob = register(&h, "bob");
        h.engine.fund(&alice, amt(1000)).await.unwrap();
        h.engine.fund(&bob, amt(1000)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let engine = h.engine.clone();
            let accounts = h.db.accounts();
            let (from, to) = if i % 2 == 0 {
                (alice.username.clone(), bob.username.clone())
            } else {
                (bob.username.clone(), alice.username.clone())
            };
            handles.push(tokio::spawn(async move {
                let sender = accounts.get(&from).unwrap();
                engine.pay(&sender, &to, amt(7)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let alice_after = h.db.accounts().get(&alice.username).unwrap();
        let bob_after = h.db.accounts().get(&bob.username).unwrap();

        // Value conservation across every interleaving.
        assert_eq!(alice_after.balance + bob_after.balance, 2000);
        // 10 transfers in each direction cancel out.
        assert_eq!(alice_after.balance, 1000);
        assert_eq!(bob_after.balance, 1000);

        // One fund + 20 pay legs per account; replay reproduces the balance.
        let alice_records = ascending_records(&h, &alice.username);
        assert_eq!(alice_records.len(), 21);
        assert_eq!(replay_balance(0, &alice_records), Some(alice_after.balance));

        let bob_records = ascending_records(&h, &bob.username);
        assert_eq!(replay_balance(0, &bob_records), Some(bob_after.balance));
    }

    #[tokio::test]
    async fn test_balance_never_negative_under_drain() {
        let h = harness();
        let alice = register(&h, "alice");
        let bob = register(&h, "bob");
        h.engine.fund(&alice, amt(50)).await.unwrap();

        // Repeated drains: successes debit, failures must not go below zero.
        for _ in 0..10 {
            let sender = h.db.accounts().get(&alice.username).unwrap();
            let _ = h.engine.pay(&sender, &bob.username, amt(20)).await;
            assert!(h.db.accounts().get(&alice.username).unwrap().balance >= 0);
        }

        let alice_after = h.db.accounts().get(&alice.username).unwrap();
        let bob_after = h.db.accounts().get(&bob.username).unwrap();
        assert_eq!(alice_after.balance + bob_after.balance, 50);
        assert_eq!(alice_after.balance, 10);
    }
}
