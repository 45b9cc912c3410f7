//! Two-account transfer execution
//!
//! This module provides the `TransferExecutor`, which moves funds from one account
//! to another and records the movement as a withdrawal/deposit pair.
//!
//! # Execution steps
//!
//! 1. Validate the amount
//! 2. Resolve the source by id and the destination by account number
//! 3. Verify the secret (immediate transfers only)
//! 4. Lock both accounts in ascending id order, with a bounded wait
//! 5. Re-read both accounts under the locks and apply `withdraw`/`deposit` to copies
//! 6. Commit both accounts and both records through the unit of work
//!
//! Any failure before step 6 drops the copies, so the store never sees a partial
//! transfer. A failed commit writes nothing. The executor never retries.

use super::lock_table::AccountLockTable;
use super::traits::{AccountRepository, Clock, LedgerChanges, SecretVerifier, UnitOfWork};
use crate::types::{
    Account, AccountId, ExecuteTransferRequest, TransactionRecord, TransferError, TransferReceipt,
    TransferRequestCore,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one daily limit reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitResetReport {
    /// Accounts whose daily transferred amount was cleared
    pub reset: usize,
    /// Accounts left untouched because of a lock timeout or a storage error
    pub failed: usize,
}

/// Atomic two-account transfer executor
///
/// Cheap to clone: every collaborator is shared behind an `Arc`, so one executor
/// can be handed to many worker threads.
#[derive(Clone)]
pub struct TransferExecutor {
    accounts: Arc<dyn AccountRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    verifier: Arc<dyn SecretVerifier>,
    clock: Arc<dyn Clock>,
    locks: Arc<AccountLockTable>,
    lock_timeout: Duration,
}

impl TransferExecutor {
    /// Create a new executor
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account lookups
    /// * `unit_of_work` - Atomic commit of accounts and records
    /// * `verifier` - Secret comparison for immediate transfers
    /// * `clock` - Timestamp source for transaction records
    /// * `locks` - Lock table shared with every other executor over the same store
    /// * `lock_timeout` - Maximum wait for each account lock
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        verifier: Arc<dyn SecretVerifier>,
        clock: Arc<dyn Clock>,
        locks: Arc<AccountLockTable>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            unit_of_work,
            verifier,
            clock,
            locks,
            lock_timeout,
        }
    }

    /// Execute an immediate, caller-issued transfer
    ///
    /// # Returns
    ///
    /// * `Ok(TransferReceipt)` - Both accounts and both records were committed
    /// * `Err(TransferError)` - Nothing was written
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the amount is not strictly positive
    /// - `AccountNotFound` if the source id or destination number does not resolve
    /// - `SameAccountTransfer` if both resolve to the same account
    /// - `InvalidPassword` if the secret does not match the source account
    /// - `LockTimeout` if a lock could not be taken in time (retryable)
    /// - any `withdraw`/`deposit` error of the ledger
    /// - `Storage` if the unit of work failed
    pub fn execute(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        Self::validate_amount(request.amount)?;

        let (source, destination) =
            self.resolve(request.source_account_id, &request.destination_account_number)?;

        if !self.verifier.verify(&request.secret, &source.secret_hash) {
            warn!(account_id = source.id, "transfer rejected: secret mismatch");
            return Err(TransferError::invalid_password(source.id));
        }

        self.apply(source.id, destination.id, request.amount)
    }

    /// Execute a transfer on behalf of a scheduled entry
    ///
    /// The secret was verified when the entry was registered, so it is not checked here.
    pub fn execute_scheduled(
        &self,
        core: &TransferRequestCore,
    ) -> Result<TransferReceipt, TransferError> {
        Self::validate_amount(core.amount)?;

        let (source, destination) = self.resolve(core.from_account_id, &core.to_account_number)?;

        self.apply(source.id, destination.id, core.amount)
    }

    /// Clear every account's daily transferred amount
    ///
    /// Each account is reset under its own lock so the reset never interleaves with
    /// a transfer touching the same account. Accounts already at zero are skipped.
    /// An account that cannot be locked or saved is logged and counted; the
    /// remaining accounts are still reset.
    pub fn reset_daily_limits(&self) -> LimitResetReport {
        let candidates = self
            .accounts
            .find_matching(&|account| account.daily_transferred_amount > Decimal::ZERO);
        let mut report = LimitResetReport::default();

        for candidate in candidates {
            match self.reset_account(candidate.id) {
                Ok(true) => report.reset += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(account_id = candidate.id, error = %e, "daily limit reset failed");
                }
            }
        }

        info!(
            accounts_reset = report.reset,
            failed = report.failed,
            "daily transfer limits reset"
        );
        report
    }

    /// Returns whether the account needed a reset
    fn reset_account(&self, id: AccountId) -> Result<bool, TransferError> {
        let _locks = self.locks.lock_all(&[id], self.lock_timeout)?;
        let mut account = self.load(id)?;
        if account.daily_transferred_amount.is_zero() {
            return Ok(false);
        }
        account.reset_daily_usage();
        self.unit_of_work.commit(LedgerChanges {
            accounts: vec![account],
            records: Vec::new(),
        })?;
        Ok(true)
    }

    /// Maximum wait for each account lock
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn validate_amount(amount: Decimal) -> Result<(), TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::invalid_amount(amount));
        }
        Ok(())
    }

    /// Resolve both sides of a transfer from unlocked snapshots
    fn resolve(
        &self,
        source_id: AccountId,
        destination_number: &str,
    ) -> Result<(Account, Account), TransferError> {
        let source = self.load(source_id)?;
        let destination = self
            .accounts
            .find_by_account_number(destination_number)
            .ok_or_else(|| TransferError::account_not_found(destination_number))?;

        if source.id == destination.id {
            return Err(TransferError::SameAccountTransfer {
                account_id: source.id,
            });
        }

        Ok((source, destination))
    }

    fn load(&self, id: AccountId) -> Result<Account, TransferError> {
        self.accounts
            .find_by_id(id)
            .ok_or_else(|| TransferError::account_not_found(id))
    }

    /// Lock, mutate copies, commit
    fn apply(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, TransferError> {
        let _locks = self
            .locks
            .lock_all(&[source_id, destination_id], self.lock_timeout)?;

        // Balances may have moved between resolution and locking
        let mut source = self.load(source_id)?;
        let mut destination = self.load(destination_id)?;

        source.withdraw(amount)?;
        destination.deposit(amount)?;

        let executed_at = self.clock.now();
        let records = TransactionRecord::transfer_pair(&source, &destination, amount, executed_at);

        let receipt_balances = (source.balance, destination.balance);
        let ids = self.unit_of_work.commit(LedgerChanges {
            accounts: vec![source, destination],
            records: records.to_vec(),
        })?;

        let (withdrawal_id, deposit_id) = match ids.as_slice() {
            [withdrawal_id, deposit_id] => (*withdrawal_id, *deposit_id),
            other => {
                return Err(TransferError::storage(format!(
                    "expected 2 record ids from commit, got {}",
                    other.len()
                )))
            }
        };

        debug!(
            source_account_id = source_id,
            destination_account_id = destination_id,
            amount = %amount,
            withdrawal_id,
            deposit_id,
            "transfer committed"
        );

        Ok(TransferReceipt {
            withdrawal_id,
            deposit_id,
            source_account_id: source_id,
            destination_account_id: destination_id,
            amount,
            source_balance: receipt_balances.0,
            destination_balance: receipt_balances.1,
            executed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::traits::TransactionRepository;
    use crate::core::verifier::PlainSecretVerifier;
    use crate::store::InMemoryStore;
    use crate::types::{AccountStatus, TransactionType};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn account(id: AccountId, balance: i64) -> Account {
        Account {
            id,
            user_id: id,
            holder_name: format!("holder-{id}"),
            account_number: format!("{:015}", 100_000_000_000_000u64 + id),
            status: AccountStatus::Active,
            balance: Decimal::new(balance, 0),
            transfer_limit: Decimal::new(5000, 0),
            daily_transfer_limit: Decimal::new(10000, 0),
            daily_transferred_amount: Decimal::ZERO,
            secret_hash: format!("pw{id}"),
        }
    }

    fn setup(accounts: Vec<Account>) -> (Arc<InMemoryStore>, TransferExecutor) {
        let store = Arc::new(InMemoryStore::with_accounts(accounts));
        let clock = FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        );
        let executor = TransferExecutor::new(
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            Arc::new(clock),
            Arc::new(AccountLockTable::new()),
            Duration::from_millis(200),
        );
        (store, executor)
    }

    fn request(source: AccountId, destination: AccountId, amount: i64) -> ExecuteTransferRequest {
        ExecuteTransferRequest {
            source_account_id: source,
            destination_account_number: format!("{:015}", 100_000_000_000_000u64 + destination),
            amount: Decimal::new(amount, 0),
            secret: format!("pw{source}"),
        }
    }

    #[test]
    fn test_execute_moves_funds_and_records_pair() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);

        let receipt = executor.execute(&request(1, 2, 1000)).unwrap();

        assert_eq!(receipt.source_balance, Decimal::new(9000, 0));
        assert_eq!(receipt.destination_balance, Decimal::new(2000, 0));

        let source = AccountRepository::find_by_id(store.as_ref(), 1).unwrap();
        let destination = AccountRepository::find_by_id(store.as_ref(), 2).unwrap();
        assert_eq!(source.balance + destination.balance, Decimal::new(11000, 0));
        assert_eq!(source.daily_transferred_amount, Decimal::new(1000, 0));

        let withdrawal = TransactionRepository::find_by_id(store.as_ref(), receipt.withdrawal_id)
            .unwrap();
        let deposit =
            TransactionRepository::find_by_id(store.as_ref(), receipt.deposit_id).unwrap();
        assert_eq!(withdrawal.tx_type, TransactionType::Withdrawal);
        assert_eq!(withdrawal.account_id, 1);
        assert_eq!(deposit.tx_type, TransactionType::Deposit);
        assert_eq!(deposit.account_id, 2);
        assert_eq!(deposit.sender, "holder-1");
        assert_eq!(deposit.receiver, "holder-2");
    }

    #[test]
    fn test_three_sequential_transfers() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);

        for _ in 0..3 {
            executor.execute(&request(1, 2, 1000)).unwrap();
        }

        let a = AccountRepository::find_by_id(store.as_ref(), 1).unwrap();
        let b = AccountRepository::find_by_id(store.as_ref(), 2).unwrap();
        assert_eq!(a.balance, Decimal::new(7000, 0));
        assert_eq!(a.daily_transferred_amount, Decimal::new(3000, 0));
        assert_eq!(b.balance, Decimal::new(4000, 0));
        assert_eq!(store.count(), 6);
    }

    #[rstest]
    #[case::zero_amount(request(1, 2, 0), TransferError::invalid_amount(Decimal::ZERO))]
    #[case::unknown_source(request(9, 2, 100), TransferError::account_not_found(9))]
    #[case::unknown_destination(
        request(1, 9, 100),
        TransferError::account_not_found("100000000000009")
    )]
    #[case::same_account(request(1, 1, 100), TransferError::SameAccountTransfer { account_id: 1 })]
    #[case::insufficient(
        request(2, 1, 2000),
        TransferError::insufficient_balance(2, Decimal::new(1000, 0), Decimal::new(2000, 0))
    )]
    fn test_execute_rejections_leave_state_untouched(
        #[case] req: ExecuteTransferRequest,
        #[case] expected: TransferError,
    ) {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);

        let err = executor.execute(&req).unwrap_err();

        assert_eq!(err, expected);
        assert_eq!(
            AccountRepository::find_by_id(store.as_ref(), 1).unwrap(),
            account(1, 10000)
        );
        assert_eq!(
            AccountRepository::find_by_id(store.as_ref(), 2).unwrap(),
            account(2, 1000)
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_execute_wrong_secret() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);
        let mut req = request(1, 2, 100);
        req.secret = "nope".to_string();

        assert_eq!(
            executor.execute(&req).unwrap_err(),
            TransferError::invalid_password(1)
        );
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_execute_scheduled_skips_secret() {
        let (_store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);
        let core = TransferRequestCore {
            user_id: 1,
            from_account_id: 1,
            to_account_number: format!("{:015}", 100_000_000_000_002u64),
            amount: Decimal::new(500, 0),
            description: String::new(),
            status: crate::types::TransferStatus::Active,
            failure_count: 0,
        };

        let receipt = executor.execute_scheduled(&core).unwrap();
        assert_eq!(receipt.source_balance, Decimal::new(9500, 0));
    }

    #[test]
    fn test_destination_status_does_not_matter() {
        let mut closed = account(2, 1000);
        closed.status = AccountStatus::Closed;
        let (_store, executor) = setup(vec![account(1, 10000), closed]);

        let receipt = executor.execute(&request(1, 2, 100)).unwrap();
        assert_eq!(receipt.destination_balance, Decimal::new(1100, 0));
    }

    #[test]
    fn test_lock_timeout_is_retryable_and_has_no_effect() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 1000)]);
        let locks = executor.locks.clone();
        let held = locks.lock_all(&[2], Duration::from_millis(10)).unwrap();

        let err = executor.execute(&request(1, 2, 100)).unwrap_err();
        drop(held);

        assert!(err.is_retryable());
        assert_eq!(store.count(), 0);
        assert!(executor.execute(&request(1, 2, 100)).is_ok());
    }

    #[test]
    fn test_reset_daily_limits() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 10000), account(3, 0)]);
        executor.execute(&request(1, 3, 1000)).unwrap();
        executor.execute(&request(2, 3, 1000)).unwrap();

        let report = executor.reset_daily_limits();
        assert_eq!(report, LimitResetReport { reset: 2, failed: 0 });

        for id in [1, 2, 3] {
            let acc = AccountRepository::find_by_id(store.as_ref(), id).unwrap();
            assert_eq!(acc.daily_transferred_amount, Decimal::ZERO);
        }
        assert_eq!(
            AccountRepository::find_by_id(store.as_ref(), 1).unwrap().balance,
            Decimal::new(9000, 0)
        );
    }

    #[test]
    fn test_reset_daily_limits_skips_locked_account() {
        let (store, executor) = setup(vec![account(1, 10000), account(2, 10000), account(3, 10000)]);
        for id in [1, 2, 3] {
            let mut acc = account(id, 10000);
            acc.daily_transferred_amount = Decimal::new(9000, 0);
            AccountRepository::save(store.as_ref(), acc).unwrap();
        }
        let locks = executor.locks.clone();
        let held = locks.lock_all(&[1], Duration::from_millis(10)).unwrap();

        let report = executor.reset_daily_limits();
        drop(held);

        assert_eq!(report, LimitResetReport { reset: 2, failed: 1 });
        let used = |id| {
            AccountRepository::find_by_id(store.as_ref(), id)
                .unwrap()
                .daily_transferred_amount
        };
        assert_eq!(used(1), Decimal::new(9000, 0));
        assert_eq!(used(2), Decimal::ZERO);
        assert_eq!(used(3), Decimal::ZERO);
    }
}
