//! Funds Transfer Engine Library
//! # Overview
//!
//! This library moves funds between bank accounts atomically and drives recurring
//! and reserved (one-shot, future-dated) transfers from periodic sweeps.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, transaction records, scheduled transfers, errors
//! - [`core`] - Business logic components:
//!   - [`core::executor`] - Two-account transfers under ordered account locks
//!   - [`core::lifecycle`] - Status and next-date rules of scheduled transfers
//!   - [`core::orchestrator`] - Registration and sweeps of scheduled transfers
//!   - [`core::history`] - Transaction history queries
//! - [`store`] - Concurrent in-memory repositories with atomic commits
//! - [`scheduler`] - Timer loop calling the sweeps
//! - [`io`] - CSV input and output
//! - [`strategy`] - Sync and async processing of transfer files
//! - [`cli`] - CLI arguments parsing and subcommands
//! - [`config`] / [`logging`] - Engine tunables and tracing setup
//!
//! # Transfer rules
//!
//! A transfer withdraws from an ACTIVE source account, within its per-transfer
//! limit, its daily limit and its balance, and deposits into the destination
//! regardless of the destination's status. Both balance changes and both
//! transaction records are committed together or not at all.
//!
//! # Scheduled transfers
//!
//! - **Recurring**: monthly on a fixed day between a start and an end date
//! - **Reserved**: once, at or after a given date-time
//!
//! Consecutive failures are counted; at the configured threshold the entry is paused.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use core::{ScheduledTransferOrchestrator, TransferEngine, TransferExecutor};
pub use io::write_accounts_csv;
pub use store::InMemoryStore;
pub use types::{
    Account, AccountId, AccountStatus, ExecuteTransferRequest, ScheduledTransfer, TransactionId,
    TransactionRecord, TransactionType, TransferError, TransferReceipt, TransferStatus,
};
