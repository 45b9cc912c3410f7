//! Collaborator traits for persistence, authorization and time
//!
//! The engine never owns storage. It talks to repositories, commits through a
//! [`UnitOfWork`], checks secrets through a [`SecretVerifier`] and reads time
//! from a [`Clock`]. All collaborators are shared across threads behind `Arc<dyn _>`.

use crate::types::{
    Account, AccountId, ScheduledTransfer, ScheduledTransferId, TransactionId, TransactionRecord,
    TransferError,
};
use chrono::{NaiveDate, NaiveDateTime};

/// Read and save access to accounts
///
/// Lookups return owned snapshots; the engine never holds a reference into the store.
pub trait AccountRepository: Send + Sync {
    /// Load an account by id
    fn find_by_id(&self, id: AccountId) -> Option<Account>;

    /// Load an account by its fifteen-digit account number
    fn find_by_account_number(&self, account_number: &str) -> Option<Account>;

    /// All accounts matching `predicate`, ordered by id
    fn find_matching(&self, predicate: &dyn Fn(&Account) -> bool) -> Vec<Account>;

    /// Insert or replace an account outside of a transfer
    fn save(&self, account: Account) -> Result<(), TransferError>;
}

/// Read access to the transaction log
///
/// Records are only ever written through [`UnitOfWork::commit`].
pub trait TransactionRepository: Send + Sync {
    fn find_by_id(&self, id: TransactionId) -> Option<TransactionRecord>;

    /// Records of one account, newest first
    fn find_by_account(&self, account_id: AccountId) -> Vec<TransactionRecord>;

    /// All records matching `predicate`, newest first
    fn find_matching(&self, predicate: &dyn Fn(&TransactionRecord) -> bool)
        -> Vec<TransactionRecord>;

    /// Total number of stored records
    fn count(&self) -> usize;
}

/// Storage of recurring and reserved transfers
pub trait ScheduledTransferRepository: Send + Sync {
    fn find_by_id(&self, id: ScheduledTransferId) -> Option<ScheduledTransfer>;

    /// All entries matching `predicate`, ordered by id
    fn find_matching(
        &self,
        predicate: &dyn Fn(&ScheduledTransfer) -> bool,
    ) -> Vec<ScheduledTransfer>;

    /// Insert or replace an entry
    ///
    /// An entry with id zero is new and receives the next id. The stored entry is returned.
    fn save(&self, transfer: ScheduledTransfer) -> Result<ScheduledTransfer, TransferError>;
}

/// Everything one transfer writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerChanges {
    /// Full replacement state of each touched account
    pub accounts: Vec<Account>,

    /// New records; ids are assigned on commit
    pub records: Vec<TransactionRecord>,
}

/// Atomic multi-entity save
pub trait UnitOfWork: Send + Sync {
    /// Persist every account and record in `changes`, or none of them
    ///
    /// Returns the ids assigned to the records, in input order.
    fn commit(&self, changes: LedgerChanges) -> Result<Vec<TransactionId>, TransferError>;
}

/// Comparison of a plain secret against a stored hash
///
/// The hashing scheme belongs to the identity component supplying the implementation.
pub trait SecretVerifier: Send + Sync {
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

/// Source of the current date and time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}
