//! Thread-safe in-memory store
//!
//! `InMemoryStore` implements every repository trait and the unit of work on top
//! of `DashMap`s, so different accounts can be read and written from many threads
//! without a global lock.
//!
//! # Commit gate
//!
//! A unit of work touches several maps. Commits take the write side of an
//! `RwLock<()>` gate and every read takes the read side, so no reader ever
//! observes half of a committed transfer. Per-account exclusion during a transfer
//! is the job of the lock table, not of this gate.

use crate::core::traits::{
    AccountRepository, LedgerChanges, ScheduledTransferRepository, TransactionRepository,
    UnitOfWork,
};
use crate::types::{
    Account, AccountId, ScheduledTransfer, ScheduledTransferId, TransactionId, TransactionRecord,
    TransferError,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, error};

/// In-memory ledger storage
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Accounts by id
    accounts: DashMap<AccountId, Account>,

    /// Account number to account id
    account_numbers: DashMap<String, AccountId>,

    /// Committed transaction records by id
    transactions: DashMap<TransactionId, TransactionRecord>,

    /// Recurring and reserved transfers by id
    scheduled: DashMap<ScheduledTransferId, ScheduledTransfer>,

    /// Last assigned transaction id
    last_transaction_id: AtomicU64,

    /// Last assigned scheduled transfer id
    last_scheduled_id: AtomicU64,

    commit_gate: RwLock<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with `accounts`
    ///
    /// A later account with the same id or account number replaces an earlier one.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.put_account(account);
        }
        store
    }

    /// Number of stored accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Every stored scheduled transfer, ordered by id
    pub fn scheduled_transfers(&self) -> Vec<ScheduledTransfer> {
        ScheduledTransferRepository::find_matching(self, &|_| true)
    }

    /// Every account, ordered by id
    pub fn accounts(&self) -> Vec<Account> {
        AccountRepository::find_matching(self, &|_| true)
    }

    fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn put_account(&self, account: Account) {
        if let Some(previous) = self.accounts.get(&account.id) {
            if previous.account_number != account.account_number {
                self.account_numbers.remove(&previous.account_number);
            }
        }
        self.account_numbers
            .insert(account.account_number.clone(), account.id);
        self.accounts.insert(account.id, account);
    }
}

impl AccountRepository for InMemoryStore {
    fn find_by_id(&self, id: AccountId) -> Option<Account> {
        let _gate = self.read_gate();
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn find_by_account_number(&self, account_number: &str) -> Option<Account> {
        let _gate = self.read_gate();
        let id = *self.account_numbers.get(account_number)?.value();
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn find_matching(&self, predicate: &dyn Fn(&Account) -> bool) -> Vec<Account> {
        let _gate = self.read_gate();
        let mut matching: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|account| account.id);
        matching
    }

    fn save(&self, account: Account) -> Result<(), TransferError> {
        let _gate = self
            .commit_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(owner) = self.account_numbers.get(&account.account_number) {
            if *owner.value() != account.id {
                return Err(TransferError::storage(format!(
                    "account number {} already belongs to account {}",
                    account.account_number,
                    owner.value()
                )));
            }
        }
        self.put_account(account);
        Ok(())
    }
}

/// Newest first; id breaks timestamp ties
fn sort_newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

impl TransactionRepository for InMemoryStore {
    fn find_by_id(&self, id: TransactionId) -> Option<TransactionRecord> {
        let _gate = self.read_gate();
        self.transactions.get(&id).map(|entry| entry.value().clone())
    }

    fn find_by_account(&self, account_id: AccountId) -> Vec<TransactionRecord> {
        TransactionRepository::find_matching(self, &|record| record.account_id == account_id)
    }

    fn find_matching(
        &self,
        predicate: &dyn Fn(&TransactionRecord) -> bool,
    ) -> Vec<TransactionRecord> {
        let _gate = self.read_gate();
        let mut matching: Vec<TransactionRecord> = self
            .transactions
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut matching);
        matching
    }

    fn count(&self) -> usize {
        let _gate = self.read_gate();
        self.transactions.len()
    }
}

impl ScheduledTransferRepository for InMemoryStore {
    fn find_by_id(&self, id: ScheduledTransferId) -> Option<ScheduledTransfer> {
        self.scheduled.get(&id).map(|entry| entry.value().clone())
    }

    fn find_matching(
        &self,
        predicate: &dyn Fn(&ScheduledTransfer) -> bool,
    ) -> Vec<ScheduledTransfer> {
        let mut matching: Vec<ScheduledTransfer> = self
            .scheduled
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|transfer| transfer.id);
        matching
    }

    fn save(&self, mut transfer: ScheduledTransfer) -> Result<ScheduledTransfer, TransferError> {
        if transfer.id == 0 {
            transfer.id = self.last_scheduled_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else {
            self.last_scheduled_id
                .fetch_max(transfer.id, Ordering::SeqCst);
        }
        self.scheduled.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }
}

impl UnitOfWork for InMemoryStore {
    fn commit(&self, changes: LedgerChanges) -> Result<Vec<TransactionId>, TransferError> {
        let _gate = self
            .commit_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Validate everything before the first write
        for account in &changes.accounts {
            match self.accounts.get(&account.id) {
                Some(existing) if existing.account_number == account.account_number => {}
                Some(_) => {
                    error!(account_id = account.id, "commit rejected: account number changed");
                    return Err(TransferError::storage(format!(
                        "account {} changed its account number",
                        account.id
                    )));
                }
                None => {
                    error!(account_id = account.id, "commit rejected: unknown account");
                    return Err(TransferError::storage(format!(
                        "account {} does not exist",
                        account.id
                    )));
                }
            }
        }

        for account in changes.accounts {
            self.accounts.insert(account.id, account);
        }

        let mut ids = Vec::with_capacity(changes.records.len());
        for mut record in changes.records {
            record.id = self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;
            ids.push(record.id);
            self.transactions.insert(record.id, record);
        }

        debug!(records = ids.len(), "unit of work committed");
        Ok(ids)
    }
}
