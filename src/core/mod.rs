//! Core business logic module
//!
//! This module contains the transfer engine components:
//! - `traits` - Collaborator interfaces (repositories, unit of work, verifier, clock)
//! - `clock` - System and fixed clocks
//! - `verifier` - Plain-text secret verifier
//! - `lock_table` - Per-account locks acquired in ascending id order
//! - `executor` - Atomic two-account transfers
//! - `lifecycle` - Pure state rules of scheduled transfers
//! - `orchestrator` - Registration and sweeps of scheduled transfers
//! - `history` - Transaction history queries
//! - `engine` - Wiring of all of the above over one store

pub mod clock;
pub mod engine;
pub mod executor;
pub mod history;
pub mod lifecycle;
pub mod lock_table;
pub mod orchestrator;
pub mod traits;
pub mod verifier;

pub use clock::{FixedClock, SystemClock};
pub use engine::TransferEngine;
pub use executor::{LimitResetReport, TransferExecutor};
pub use history::{HistoryQuery, TransactionHistory};
pub use lifecycle::ExecutionOutcome;
pub use lock_table::{AccountLockTable, AccountLocks};
pub use orchestrator::{DailyReport, ScheduledTransferOrchestrator, SweepReport};
pub use traits::{
    AccountRepository, Clock, LedgerChanges, ScheduledTransferRepository, SecretVerifier,
    TransactionRepository, UnitOfWork,
};
pub use verifier::PlainSecretVerifier;
