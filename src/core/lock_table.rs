//! Per-account locks with a global acquisition order
//!
//! Every caller that needs more than one account lock goes through
//! [`AccountLockTable::lock_all`], which sorts the ids ascending before acquiring.
//! Two transfers over the same pair therefore contend for the same first lock, and
//! no cycle of waiters can form, whatever the direction of each transfer.
//!
//! Each acquisition waits at most the configured timeout. On timeout every lock
//! already taken by the call is released before the error is returned.
//!
//! The scheduled-transfer orchestrator keeps a second table of its own, keyed by
//! scheduled transfer id, and maps its timeouts to `ScheduledTransferBusy`.

use crate::types::{AccountId, TransferError};
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Table of currently held account locks
#[derive(Debug, Default)]
pub struct AccountLockTable {
    held: Mutex<HashSet<AccountId>>,
    released: Condvar,
}

/// Locks held by one caller; released on drop
#[derive(Debug)]
#[must_use = "account locks are released as soon as the guard is dropped"]
pub struct AccountLocks<'a> {
    table: &'a AccountLockTable,
    ids: Vec<AccountId>,
}

impl AccountLocks<'_> {
    /// Locked ids in acquisition order
    pub fn ids(&self) -> &[AccountId] {
        &self.ids
    }
}

impl Drop for AccountLocks<'_> {
    fn drop(&mut self) {
        // Reverse acquisition order
        for id in self.ids.drain(..).rev() {
            self.table.release(id);
        }
    }
}

impl AccountLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every id in `ids` in ascending order
    ///
    /// Duplicate ids are locked once.
    ///
    /// # Errors
    ///
    /// `LockTimeout` naming the account whose lock could not be taken within
    /// `timeout`. No lock is held when this returns an error.
    pub fn lock_all(
        &self,
        ids: &[AccountId],
        timeout: Duration,
    ) -> Result<AccountLocks<'_>, TransferError> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut locks = AccountLocks {
            table: self,
            ids: Vec::with_capacity(ordered.len()),
        };

        for id in ordered {
            self.acquire(id, timeout)?;
            locks.ids.push(id);
        }

        Ok(locks)
    }

    /// Whether `id` is currently locked by anyone
    pub fn is_locked(&self, id: AccountId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    fn acquire(&self, id: AccountId, timeout: Duration) -> Result<(), TransferError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        while held.contains(&id) {
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                debug!(account_id = id, waited_ms, "account lock wait timed out");
                return Err(TransferError::lock_timeout(id, waited_ms));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }

        held.insert(id);
        Ok(())
    }

    fn release(&self, id: AccountId) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&id);
        drop(held);
        self.released.notify_all();
    }
}
