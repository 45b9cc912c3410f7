//! Scheduled transfer orchestration
//!
//! This module provides the `ScheduledTransferOrchestrator`, which owns the
//! registration, lookup and unattended execution of recurring and reserved transfers.
//!
//! # Sweeps
//!
//! - **Recurring sweep** (daily): every ACTIVE recurring entry whose next execution
//!   date is on or before today
//! - **Reserved sweep** (short poll): every ACTIVE reserved entry whose reservation
//!   instant is at or before now
//! - **Expiry sweep** (daily): every ACTIVE recurring entry whose end date has passed
//!
//! Each entry is executed and persisted on its own. A failing entry is logged and
//! counted; it never stops the sweep. Sweeps hold no state between runs: every pass
//! queries the repository again using the clock it was given.
//!
//! # Entry locks
//!
//! Sweeps, `update_*` and `cancel` each hold the entry's lock for their whole
//! read-modify-write. A sweep also re-reads the entry before running it and again
//! before saving the outcome; if the stored entry no longer equals the snapshot it
//! started from, the outcome is dropped and the stored entry wins.

use super::executor::TransferExecutor;
use super::lifecycle::{self, ExecutionOutcome};
use super::lock_table::{AccountLockTable, AccountLocks};
use super::traits::{AccountRepository, Clock, ScheduledTransferRepository, SecretVerifier};
use crate::types::{
    validate_account_number, Account, AccountId, RecurringRegistration, RecurringSchedule,
    ReservedRegistration, ReservedSchedule, Schedule, ScheduleKind, ScheduledTransfer,
    ScheduledTransferId, TransferError, TransferRequestCore, TransferStatus, UserId,
};
use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Largest registrable transfer day
const MAX_TRANSFER_DAY: u32 = 31;

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries picked up by the sweep
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries that reached the failure threshold during this sweep
    pub paused: usize,
    /// Entries that reached COMPLETED during this sweep
    pub completed: usize,
    /// Entries whose new state could not be saved
    pub save_errors: usize,
    /// Entries left alone because another caller held or changed them
    pub skipped: usize,
}

/// Summary of one daily maintenance cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyReport {
    /// Accounts whose daily transferred amount was cleared
    pub accounts_reset: usize,
    /// Accounts the reset could not lock or save
    pub reset_failures: usize,
    pub recurring: SweepReport,
    pub expired: SweepReport,
}

/// Registration, lookup and sweeps of scheduled transfers
#[derive(Clone)]
pub struct ScheduledTransferOrchestrator {
    executor: TransferExecutor,
    accounts: Arc<dyn AccountRepository>,
    transfers: Arc<dyn ScheduledTransferRepository>,
    verifier: Arc<dyn SecretVerifier>,
    clock: Arc<dyn Clock>,
    max_consecutive_failures: u32,
    /// Keyed by scheduled transfer id
    entry_locks: Arc<AccountLockTable>,
}

impl ScheduledTransferOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `executor` - Executes each due entry
    /// * `accounts` - Source account checks at registration
    /// * `transfers` - Scheduled transfer storage
    /// * `verifier` - Secret check at registration and update
    /// * `clock` - Defines "today" and "now" for every sweep
    /// * `max_consecutive_failures` - Failure count at which an entry is paused
    pub fn new(
        executor: TransferExecutor,
        accounts: Arc<dyn AccountRepository>,
        transfers: Arc<dyn ScheduledTransferRepository>,
        verifier: Arc<dyn SecretVerifier>,
        clock: Arc<dyn Clock>,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            executor,
            accounts,
            transfers,
            verifier,
            clock,
            max_consecutive_failures,
            entry_locks: Arc::new(AccountLockTable::new()),
        }
    }

    /// Register a monthly recurring transfer
    ///
    /// The first execution date is the first `transfer_day` on or after `start_date`.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` unless the amount is strictly positive
    /// - `InvalidAccountNumber` if the destination number is malformed
    /// - `InvalidTransferDay` if the day is outside 1..=31 or beyond the start month
    /// - `InvalidDateRange` if `start_date` is after `end_date`
    /// - `AccountNotFound` if the source account does not exist
    /// - `NotAccountOwner` if `user_id` does not own the source account
    /// - `InvalidPassword` if the secret does not match the source account
    pub fn register_recurring(
        &self,
        registration: RecurringRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let transfer = self.build_recurring(0, registration)?;
        let saved = self.transfers.save(transfer)?;
        info!(
            transfer_id = saved.id,
            from_account_id = saved.core.from_account_id,
            amount = %saved.core.amount,
            "recurring transfer registered"
        );
        Ok(saved)
    }

    /// Register a one-shot reserved transfer
    ///
    /// # Errors
    ///
    /// - `InvalidDateRange` unless `reserved_at` is strictly in the future
    /// - the amount, account number, source and secret errors of
    ///   [`Self::register_recurring`]
    pub fn register_reserved(
        &self,
        registration: ReservedRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let transfer = self.build_reserved(0, registration)?;
        let saved = self.transfers.save(transfer)?;
        info!(
            transfer_id = saved.id,
            from_account_id = saved.core.from_account_id,
            amount = %saved.core.amount,
            "reserved transfer registered"
        );
        Ok(saved)
    }

    /// Replace an ACTIVE or PAUSED recurring entry with a new registration
    ///
    /// The entry restarts as ACTIVE with a zero failure count. The owner cannot change.
    ///
    /// # Errors
    ///
    /// - `ScheduledTransferBusy` if a sweep or another caller holds the entry too long
    /// - `InvalidTransferState` if the entry is terminal or of the other kind
    /// - `NotAccountOwner` if the registration names another user
    /// - any error of [`Self::register_recurring`]
    pub fn update_recurring(
        &self,
        id: ScheduledTransferId,
        registration: RecurringRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let _lock = self.lock_entry(id)?;
        let existing = self.load_modifiable(id, ScheduleKind::Recurring, "updated")?;
        Self::check_same_owner(&existing, registration.user_id)?;
        let transfer = self.build_recurring(id, registration)?;
        let saved = self.transfers.save(transfer)?;
        info!(transfer_id = id, "recurring transfer updated");
        Ok(saved)
    }

    /// Replace an ACTIVE or PAUSED reserved entry with a new registration
    pub fn update_reserved(
        &self,
        id: ScheduledTransferId,
        registration: ReservedRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let _lock = self.lock_entry(id)?;
        let existing = self.load_modifiable(id, ScheduleKind::Reserved, "updated")?;
        Self::check_same_owner(&existing, registration.user_id)?;
        let transfer = self.build_reserved(id, registration)?;
        let saved = self.transfers.save(transfer)?;
        info!(transfer_id = id, "reserved transfer updated");
        Ok(saved)
    }

    /// Abandon an entry: ACTIVE or PAUSED becomes FAILED and is kept for audit
    ///
    /// # Errors
    ///
    /// - `ScheduledTransferBusy` if a sweep or another caller holds the entry too long
    /// - `ScheduledTransferNotFound` if the id does not resolve
    /// - `InvalidTransferState` if the entry is already COMPLETED or FAILED
    pub fn cancel(&self, id: ScheduledTransferId) -> Result<ScheduledTransfer, TransferError> {
        let _lock = self.lock_entry(id)?;
        let mut transfer = self.find(id)?;
        if transfer.core.status.is_terminal() {
            return Err(TransferError::invalid_transfer_state(
                id,
                transfer.core.status,
                "cancelled",
            ));
        }
        transfer.core.status = TransferStatus::Failed;
        let saved = self.transfers.save(transfer)?;
        info!(transfer_id = id, kind = %saved.kind(), "scheduled transfer cancelled");
        Ok(saved)
    }

    /// Current time on the orchestrator's clock
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Load one entry by id
    pub fn find(&self, id: ScheduledTransferId) -> Result<ScheduledTransfer, TransferError> {
        self.transfers
            .find_by_id(id)
            .ok_or(TransferError::ScheduledTransferNotFound { id })
    }

    /// ACTIVE entries of `kind` owned by `user_id`, ordered by id
    pub fn list_active(&self, user_id: UserId, kind: ScheduleKind) -> Vec<ScheduledTransfer> {
        self.transfers.find_matching(&|transfer| {
            transfer.core.user_id == user_id
                && transfer.kind() == kind
                && transfer.core.status == TransferStatus::Active
        })
    }

    /// Execute every due recurring entry once
    pub fn run_recurring_sweep(&self) -> SweepReport {
        let now = self.clock.now();
        info!(today = %now.date(), "recurring sweep started");
        let report = self.run_due(ScheduleKind::Recurring, now);
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            paused = report.paused,
            completed = report.completed,
            skipped = report.skipped,
            "recurring sweep finished"
        );
        report
    }

    /// Execute every due reserved entry once
    pub fn run_reserved_sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let report = self.run_due(ScheduleKind::Reserved, now);
        if report.total > 0 {
            info!(
                total = report.total,
                succeeded = report.succeeded,
                failed = report.failed,
                paused = report.paused,
                skipped = report.skipped,
                "reserved sweep finished"
            );
        }
        report
    }

    /// Complete every ACTIVE recurring entry whose end date is before today
    pub fn run_expiry_sweep(&self) -> SweepReport {
        let today = self.clock.today();
        let expired = self
            .transfers
            .find_matching(&|transfer| lifecycle::is_expired(transfer, today));
        let mut report = SweepReport {
            total: expired.len(),
            ..SweepReport::default()
        };

        for snapshot in expired {
            let id = snapshot.id;
            let Some(_lock) = self.claim(&snapshot, &mut report) else {
                continue;
            };
            let mut transfer = snapshot;
            lifecycle::expire(&mut transfer);
            match self.transfers.save(transfer) {
                Ok(_) => {
                    report.completed += 1;
                    info!(transfer_id = id, "recurring transfer expired");
                }
                Err(e) => {
                    report.save_errors += 1;
                    error!(transfer_id = id, error = %e, "failed to save expired transfer");
                }
            }
        }

        info!(today = %today, expired = report.completed, "expiry sweep finished");
        report
    }

    /// Daily cycle: reset daily limits, run the recurring sweep, then the expiry sweep
    ///
    /// Recurring entries ending today still run before the expiry sweep looks at them.
    /// Accounts the reset could not reach are logged and counted; the sweeps still run.
    pub fn run_daily_cycle(&self) -> DailyReport {
        let reset = self.executor.reset_daily_limits();
        DailyReport {
            accounts_reset: reset.reset,
            reset_failures: reset.failed,
            recurring: self.run_recurring_sweep(),
            expired: self.run_expiry_sweep(),
        }
    }

    fn run_due(&self, kind: ScheduleKind, now: NaiveDateTime) -> SweepReport {
        let due = self.transfers.find_matching(&|transfer| {
            transfer.kind() == kind && lifecycle::is_executable(transfer, now)
        });
        let mut report = SweepReport {
            total: due.len(),
            ..SweepReport::default()
        };

        for transfer in due {
            self.run_entry(transfer, &mut report);
        }
        report
    }

    fn run_entry(&self, snapshot: ScheduledTransfer, report: &mut SweepReport) {
        let id = snapshot.id;
        let Some(_lock) = self.claim(&snapshot, report) else {
            return;
        };
        let mut transfer = snapshot.clone();
        let outcome = match self.executor.execute_scheduled(&transfer.core) {
            Ok(receipt) => {
                report.succeeded += 1;
                info!(
                    transfer_id = id,
                    kind = %transfer.kind(),
                    withdrawal_id = receipt.withdrawal_id,
                    amount = %receipt.amount,
                    "scheduled transfer executed"
                );
                ExecutionOutcome::Succeeded {
                    at: receipt.executed_at,
                }
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    transfer_id = id,
                    kind = %transfer.kind(),
                    from_account_id = transfer.core.from_account_id,
                    error = %e,
                    "scheduled transfer failed"
                );
                ExecutionOutcome::Failed {
                    at: self.clock.now(),
                }
            }
        };

        let status = match lifecycle::apply_outcome(
            &mut transfer,
            outcome,
            self.max_consecutive_failures,
        ) {
            Ok(status) => status,
            Err(e) => {
                // Counters are already applied; the date stays where it was
                error!(transfer_id = id, error = %e, "could not advance schedule");
                transfer.core.status
            }
        };

        // A caller outside this orchestrator's locks may have changed it meanwhile
        if self.transfers.find_by_id(id).as_ref() != Some(&snapshot) {
            report.skipped += 1;
            warn!(
                transfer_id = id,
                "scheduled transfer changed while running, outcome not saved"
            );
            return;
        }

        match status {
            TransferStatus::Paused => {
                report.paused += 1;
                warn!(
                    transfer_id = id,
                    failure_count = transfer.core.failure_count,
                    "scheduled transfer paused"
                );
            }
            TransferStatus::Completed => report.completed += 1,
            _ => {}
        }

        if let Err(e) = self.transfers.save(transfer) {
            report.save_errors += 1;
            error!(transfer_id = id, error = %e, "failed to save scheduled transfer");
        }
    }

    /// Lock the entry and confirm it still equals `snapshot`
    ///
    /// Returns `None`, counting the entry as skipped, if the lock cannot be taken or
    /// the entry changed since the sweep queried it.
    fn claim(
        &self,
        snapshot: &ScheduledTransfer,
        report: &mut SweepReport,
    ) -> Option<AccountLocks<'_>> {
        let lock = match self.lock_entry(snapshot.id) {
            Ok(lock) => lock,
            Err(e) => {
                report.skipped += 1;
                warn!(transfer_id = snapshot.id, error = %e, "scheduled transfer busy, skipped");
                return None;
            }
        };
        if self.transfers.find_by_id(snapshot.id).as_ref() != Some(snapshot) {
            report.skipped += 1;
            info!(transfer_id = snapshot.id, "scheduled transfer changed before running, skipped");
            return None;
        }
        Some(lock)
    }

    fn lock_entry(&self, id: ScheduledTransferId) -> Result<AccountLocks<'_>, TransferError> {
        self.entry_locks
            .lock_all(&[id], self.executor.lock_timeout())
            .map_err(|e| match e {
                TransferError::LockTimeout { waited_ms, .. } => {
                    TransferError::ScheduledTransferBusy { id, waited_ms }
                }
                other => other,
            })
    }

    fn check_same_owner(
        existing: &ScheduledTransfer,
        user_id: UserId,
    ) -> Result<(), TransferError> {
        if existing.core.user_id != user_id {
            warn!(
                transfer_id = existing.id,
                user_id,
                owner = existing.core.user_id,
                "update rejected: owner mismatch"
            );
            return Err(TransferError::not_account_owner(
                user_id,
                existing.core.from_account_id,
            ));
        }
        Ok(())
    }

    fn load_modifiable(
        &self,
        id: ScheduledTransferId,
        kind: ScheduleKind,
        operation: &str,
    ) -> Result<ScheduledTransfer, TransferError> {
        let existing = self.find(id)?;
        if existing.kind() != kind || existing.core.status.is_terminal() {
            return Err(TransferError::invalid_transfer_state(
                id,
                existing.core.status,
                operation,
            ));
        }
        Ok(existing)
    }

    /// Checks shared by both registration kinds; returns the verified source account
    fn validate_common(
        &self,
        user_id: UserId,
        from_account_id: AccountId,
        to_account_number: &str,
        amount: Decimal,
        secret: &str,
    ) -> Result<Account, TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::invalid_amount(amount));
        }
        validate_account_number(to_account_number)?;

        let source = self
            .accounts
            .find_by_id(from_account_id)
            .ok_or_else(|| TransferError::account_not_found(from_account_id))?;

        if source.user_id != user_id {
            warn!(account_id = source.id, user_id, "registration rejected: not the owner");
            return Err(TransferError::not_account_owner(user_id, source.id));
        }

        if !self.verifier.verify(secret, &source.secret_hash) {
            warn!(account_id = source.id, "registration rejected: secret mismatch");
            return Err(TransferError::invalid_password(source.id));
        }
        Ok(source)
    }

    fn build_recurring(
        &self,
        id: ScheduledTransferId,
        reg: RecurringRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let max_day = lifecycle::days_in_month(reg.start_date.year(), reg.start_date.month())
            .unwrap_or(MAX_TRANSFER_DAY)
            .min(MAX_TRANSFER_DAY);
        if reg.transfer_day == 0 || reg.transfer_day > max_day {
            return Err(TransferError::InvalidTransferDay {
                day: reg.transfer_day,
                max_day,
            });
        }
        if reg.start_date > reg.end_date {
            return Err(TransferError::invalid_date_range(format!(
                "start date {} is after end date {}",
                reg.start_date, reg.end_date
            )));
        }

        let source = self.validate_common(
            reg.user_id,
            reg.from_account_id,
            &reg.to_account_number,
            reg.amount,
            &reg.secret,
        )?;

        let next_execution_date = lifecycle::first_execution_date(reg.start_date, reg.transfer_day)
            .ok_or_else(|| TransferError::invalid_date_range("start date out of range"))?;

        Ok(ScheduledTransfer {
            id,
            core: TransferRequestCore {
                user_id: source.user_id,
                from_account_id: source.id,
                to_account_number: reg.to_account_number,
                amount: reg.amount,
                description: reg.description,
                status: TransferStatus::Active,
                failure_count: 0,
            },
            schedule: Schedule::Recurring(RecurringSchedule {
                transfer_day: reg.transfer_day,
                next_execution_date,
                start_date: reg.start_date,
                end_date: reg.end_date,
            }),
        })
    }

    fn build_reserved(
        &self,
        id: ScheduledTransferId,
        reg: ReservedRegistration,
    ) -> Result<ScheduledTransfer, TransferError> {
        let now = self.clock.now();
        if reg.reserved_at <= now {
            return Err(TransferError::invalid_date_range(format!(
                "reservation time {} is not after {}",
                reg.reserved_at, now
            )));
        }

        let source = self.validate_common(
            reg.user_id,
            reg.from_account_id,
            &reg.to_account_number,
            reg.amount,
            &reg.secret,
        )?;

        Ok(ScheduledTransfer {
            id,
            core: TransferRequestCore {
                user_id: source.user_id,
                from_account_id: source.id,
                to_account_number: reg.to_account_number,
                amount: reg.amount,
                description: reg.description,
                status: TransferStatus::Active,
                failure_count: 0,
            },
            schedule: Schedule::Reserved(ReservedSchedule {
                reserved_at: reg.reserved_at,
                completed_at: None,
            }),
        })
    }
}
