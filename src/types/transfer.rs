//! Transfer requests: immediate and scheduled
//!
//! An immediate transfer is an [`ExecuteTransferRequest`]. A scheduled transfer is a
//! [`ScheduledTransfer`]: a shared [`TransferRequestCore`] plus a [`Schedule`] payload
//! that is either a monthly recurring schedule or a one-shot reservation.

use super::account::{AccountId, UserId};
use super::transaction::TransactionId;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduled transfer identifier, assigned by the store on first save
pub type ScheduledTransferId = u64;

/// Lifecycle state of a scheduled transfer
///
/// ```text
/// ACTIVE --success (last run)--> COMPLETED
/// ACTIVE --failure x threshold--> PAUSED
/// ACTIVE | PAUSED --cancel--> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    /// Eligible for execution when due
    Active,

    /// Stopped after too many consecutive failures
    Paused,

    /// Terminal: the schedule ran to completion
    Completed,

    /// Terminal: explicitly abandoned
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferStatus::Active => "ACTIVE",
            TransferStatus::Paused => "PAUSED",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Discriminator of the [`Schedule`] payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Recurring,
    Reserved,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Recurring => f.write_str("recurring"),
            ScheduleKind::Reserved => f.write_str("reserved"),
        }
    }
}

/// Attributes shared by both kinds of scheduled transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequestCore {
    /// Requesting user, owner of the scheduled transfer
    pub user_id: UserId,

    /// Source account, referenced but not owned
    pub from_account_id: AccountId,

    /// Destination account number
    pub to_account_number: String,

    pub amount: Decimal,

    /// Free-text memo
    pub description: String,

    pub status: TransferStatus,

    /// Consecutive failed executions; reset by a success
    pub failure_count: u32,
}

/// Monthly schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringSchedule {
    /// Day of month, 1..=31; clamped to the month length when computing dates
    pub transfer_day: u32,

    /// Next date the transfer becomes due
    pub next_execution_date: NaiveDate,

    /// First day of the validity window (inclusive)
    pub start_date: NaiveDate,

    /// Last day of the validity window (inclusive)
    pub end_date: NaiveDate,
}

/// One-shot reservation
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedSchedule {
    /// Instant from which the transfer is due
    pub reserved_at: NaiveDateTime,

    /// Set when the transfer succeeds
    pub completed_at: Option<NaiveDateTime>,
}

/// Variant-specific payload of a scheduled transfer
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Recurring(RecurringSchedule),
    Reserved(ReservedSchedule),
}

impl Schedule {
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Schedule::Recurring(_) => ScheduleKind::Recurring,
            Schedule::Reserved(_) => ScheduleKind::Reserved,
        }
    }
}

/// A stored recurring or reserved transfer
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTransfer {
    /// Zero until first saved
    pub id: ScheduledTransferId,
    pub core: TransferRequestCore,
    pub schedule: Schedule,
}

impl ScheduledTransfer {
    pub fn kind(&self) -> ScheduleKind {
        self.schedule.kind()
    }

    pub fn status(&self) -> TransferStatus {
        self.core.status
    }

    pub fn as_recurring(&self) -> Option<&RecurringSchedule> {
        match &self.schedule {
            Schedule::Recurring(recurring) => Some(recurring),
            Schedule::Reserved(_) => None,
        }
    }

    pub fn as_reserved(&self) -> Option<&ReservedSchedule> {
        match &self.schedule {
            Schedule::Reserved(reserved) => Some(reserved),
            Schedule::Recurring(_) => None,
        }
    }
}

/// Immediate transfer issued by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteTransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_number: String,
    pub amount: Decimal,

    /// Plain authorization secret of the source account
    pub secret: String,
}

/// Outcome of a committed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub withdrawal_id: TransactionId,
    pub deposit_id: TransactionId,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
    pub executed_at: NaiveDateTime,
}

/// Registration (or replacement) payload of a recurring transfer
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringRegistration {
    pub user_id: UserId,
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount: Decimal,
    pub description: String,
    pub transfer_day: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub secret: String,
}

/// Registration (or replacement) payload of a reserved transfer
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedRegistration {
    pub user_id: UserId,
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount: Decimal,
    pub description: String,
    pub reserved_at: NaiveDateTime,
    pub secret: String,
}
