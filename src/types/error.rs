//! Error types for the Funds Transfer Engine
//!
//! This module defines every error a transfer, a scheduled-transfer registration
//! or a sweep can surface. Each limit violation has its own variant so callers can
//! present a precise reason to the account holder.
//!
//! # Error Categories
//!
//! - **Resolution Errors**: account or scheduled transfer does not exist
//! - **Authorization Errors**: secret mismatch, account owned by another user
//! - **Ledger Errors**: account status, per-transaction limit, daily limit, balance
//! - **Scheduling Errors**: date ranges, transfer day, lifecycle state
//! - **Transient Errors**: lock wait timeouts (the only retryable kind)
//! - **Storage Errors**: the unit of work could not be persisted

use crate::types::account::{AccountId, AccountStatus, UserId};
use crate::types::transfer::{ScheduledTransferId, TransferStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the transfer engine
///
/// Every operation of the executor and the orchestrator returns this type.
/// Errors carry enough context to log them without consulting the store again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// Source account id or destination account number does not resolve
    #[error("Account not found: {reference}")]
    AccountNotFound {
        /// The id or account number that failed to resolve
        reference: String,
    },

    /// Authorization secret does not match the source account's stored hash
    #[error("Invalid password for account {account_id}")]
    InvalidPassword { account_id: AccountId },

    /// Account is not ACTIVE and cannot send funds
    #[error("Account {account_id} has invalid status {status}")]
    InvalidAccountStatus {
        account_id: AccountId,
        status: AccountStatus,
    },

    /// Amount exceeds the per-transaction transfer limit
    #[error("Transfer limit exceeded for account {account_id}: limit {limit}, requested {requested}")]
    TransferLimitExceeded {
        account_id: AccountId,
        limit: Decimal,
        requested: Decimal,
    },

    /// Amount would push today's cumulative transfers over the daily limit
    #[error("Daily transfer limit exceeded for account {account_id}: limit {limit}, already transferred {already_transferred}, requested {requested}")]
    DailyTransferLimitExceeded {
        account_id: AccountId,
        limit: Decimal,
        already_transferred: Decimal,
        requested: Decimal,
    },

    /// Amount exceeds the current balance
    #[error("Insufficient balance for account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Scheduling request with end before start, past-dated reservation, or
    /// a history query whose start is after its end
    #[error("Invalid date range: {message}")]
    InvalidDateRange { message: String },

    /// Bounded wait for an account lock elapsed
    ///
    /// Transient: the attempt had no effect and may be retried.
    #[error("Timed out after {waited_ms}ms waiting for lock on account {account_id}")]
    LockTimeout { account_id: AccountId, waited_ms: u64 },

    /// Bounded wait for a scheduled transfer elapsed while a sweep or another
    /// caller was modifying it; transient like `LockTimeout`
    #[error("Timed out after {waited_ms}ms waiting for scheduled transfer {id}")]
    ScheduledTransferBusy { id: ScheduledTransferId, waited_ms: u64 },

    /// Registering user does not own the source account, or an update would
    /// move an entry to another owner
    #[error("User {user_id} does not own account {account_id}")]
    NotAccountOwner { user_id: UserId, account_id: AccountId },

    /// Amount is zero, negative, or otherwise unusable for the operation
    #[error("Invalid amount {amount}")]
    InvalidAmount { amount: Decimal },

    /// Source and destination resolve to the same account
    #[error("Cannot transfer from account {account_id} to itself")]
    SameAccountTransfer { account_id: AccountId },

    /// Recurring transfer day outside 1..=31 or beyond the start month's length
    #[error("Invalid transfer day {day}: must be between 1 and {max_day}")]
    InvalidTransferDay { day: u32, max_day: u32 },

    /// Account number is not exactly fifteen ASCII digits
    #[error("Invalid account number '{number}'")]
    InvalidAccountNumber { number: String },

    /// Scheduled transfer id does not resolve
    #[error("Scheduled transfer {id} not found")]
    ScheduledTransferNotFound { id: ScheduledTransferId },

    /// Scheduled transfer is in a state that does not allow the operation
    #[error("Scheduled transfer {id} is {status} and cannot be {operation}")]
    InvalidTransferState {
        id: ScheduledTransferId,
        status: TransferStatus,
        operation: String,
    },

    /// Decimal arithmetic overflowed
    #[error("Arithmetic overflow in {operation} for account {account_id}")]
    ArithmeticOverflow {
        operation: String,
        account_id: AccountId,
    },

    /// The unit of work could not be persisted; nothing was written
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl TransferError {
    /// Whether the failed attempt may be retried as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::LockTimeout { .. } | TransferError::ScheduledTransferBusy { .. }
        )
    }

    pub fn account_not_found(reference: impl ToString) -> Self {
        TransferError::AccountNotFound {
            reference: reference.to_string(),
        }
    }

    pub fn invalid_password(account_id: AccountId) -> Self {
        TransferError::InvalidPassword { account_id }
    }

    pub fn invalid_account_status(account_id: AccountId, status: AccountStatus) -> Self {
        TransferError::InvalidAccountStatus { account_id, status }
    }

    pub fn transfer_limit_exceeded(account_id: AccountId, limit: Decimal, requested: Decimal) -> Self {
        TransferError::TransferLimitExceeded {
            account_id,
            limit,
            requested,
        }
    }

    pub fn daily_transfer_limit_exceeded(
        account_id: AccountId,
        limit: Decimal,
        already_transferred: Decimal,
        requested: Decimal,
    ) -> Self {
        TransferError::DailyTransferLimitExceeded {
            account_id,
            limit,
            already_transferred,
            requested,
        }
    }

    pub fn insufficient_balance(account_id: AccountId, balance: Decimal, requested: Decimal) -> Self {
        TransferError::InsufficientBalance {
            account_id,
            balance,
            requested,
        }
    }

    pub fn invalid_date_range(message: impl Into<String>) -> Self {
        TransferError::InvalidDateRange {
            message: message.into(),
        }
    }

    pub fn lock_timeout(account_id: AccountId, waited_ms: u64) -> Self {
        TransferError::LockTimeout {
            account_id,
            waited_ms,
        }
    }

    pub fn not_account_owner(user_id: UserId, account_id: AccountId) -> Self {
        TransferError::NotAccountOwner {
            user_id,
            account_id,
        }
    }

    pub fn invalid_amount(amount: Decimal) -> Self {
        TransferError::InvalidAmount { amount }
    }

    pub fn arithmetic_overflow(operation: &str, account_id: AccountId) -> Self {
        TransferError::ArithmeticOverflow {
            operation: operation.to_string(),
            account_id,
        }
    }

    pub fn invalid_transfer_state(
        id: ScheduledTransferId,
        status: TransferStatus,
        operation: &str,
    ) -> Self {
        TransferError::InvalidTransferState {
            id,
            status,
            operation: operation.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        TransferError::Storage {
            message: message.into(),
        }
    }
}

/// Errors raised while loading the engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
