//! Types module
//!
//! Contains the domain values shared by the engine, the store and the I/O layer:
//! - `account`: Account state and ledger rules
//! - `transaction`: ledger transaction records
//! - `transfer`: immediate and scheduled transfer requests
//! - `error`: Error types for the transfer engine

pub mod account;
pub mod error;
pub mod transaction;
pub mod transfer;

pub use account::{validate_account_number, Account, AccountId, AccountStatus, UserId};
pub use error::{ConfigError, TransferError};
pub use transaction::{TransactionId, TransactionRecord, TransactionType};
pub use transfer::{
    ExecuteTransferRequest, RecurringRegistration, RecurringSchedule, ReservedRegistration,
    ReservedSchedule, Schedule, ScheduleKind, ScheduledTransfer, ScheduledTransferId,
    TransferReceipt, TransferRequestCore, TransferStatus,
};
