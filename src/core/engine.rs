//! Wiring of the engine components over one store
//!
//! `TransferEngine` builds the lock table, executor, orchestrator and history view
//! that share a single [`InMemoryStore`], so callers (CLI strategies, tests,
//! benchmarks) get a consistent set of components from one constructor.

use super::clock::SystemClock;
use super::executor::TransferExecutor;
use super::history::TransactionHistory;
use super::lock_table::AccountLockTable;
use super::orchestrator::ScheduledTransferOrchestrator;
use super::traits::{Clock, ScheduledTransferRepository, SecretVerifier};
use super::verifier::PlainSecretVerifier;
use crate::config::EngineConfig;
use crate::store::InMemoryStore;
use crate::types::{Account, ScheduledTransfer, TransferError};
use std::sync::Arc;

/// Executor, orchestrator and history sharing one store and one lock table
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<InMemoryStore>,
    executor: TransferExecutor,
    orchestrator: Arc<ScheduledTransferOrchestrator>,
    history: TransactionHistory,
}

impl TransferEngine {
    /// Wire every component over `store`
    ///
    /// # Arguments
    ///
    /// * `store` - Repositories and unit of work
    /// * `verifier` - Secret comparison for transfers and registrations
    /// * `clock` - Time source for records and sweeps
    /// * `config` - Lock timeout and failure threshold
    pub fn new(
        store: Arc<InMemoryStore>,
        verifier: Arc<dyn SecretVerifier>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        let executor = TransferExecutor::new(
            store.clone(),
            store.clone(),
            Arc::clone(&verifier),
            Arc::clone(&clock),
            Arc::new(AccountLockTable::new()),
            config.lock_timeout(),
        );
        let orchestrator = Arc::new(ScheduledTransferOrchestrator::new(
            executor.clone(),
            store.clone(),
            store.clone(),
            verifier,
            clock,
            config.max_consecutive_failures,
        ));
        let history = TransactionHistory::new(store.clone());

        Self {
            store,
            executor,
            orchestrator,
            history,
        }
    }

    /// Engine over a fresh store holding `accounts`, with plain-text secrets
    pub fn with_accounts(
        accounts: Vec<Account>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryStore::with_accounts(accounts)),
            Arc::new(PlainSecretVerifier),
            clock,
            config,
        )
    }

    /// Same as [`Self::with_accounts`] on the system clock
    pub fn with_accounts_now(accounts: Vec<Account>, config: &EngineConfig) -> Self {
        Self::with_accounts(accounts, Arc::new(SystemClock), config)
    }

    /// Store previously exported scheduled transfers under their own ids
    ///
    /// # Errors
    ///
    /// Stops at the first entry the store refuses.
    pub fn load_schedule(
        &self,
        transfers: impl IntoIterator<Item = ScheduledTransfer>,
    ) -> Result<usize, TransferError> {
        let mut loaded = 0;
        for transfer in transfers {
            ScheduledTransferRepository::save(self.store.as_ref(), transfer)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn executor(&self) -> &TransferExecutor {
        &self.executor
    }

    pub fn orchestrator(&self) -> &Arc<ScheduledTransferOrchestrator> {
        &self.orchestrator
    }

    pub fn history(&self) -> &TransactionHistory {
        &self.history
    }
}
