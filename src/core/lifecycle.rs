//! Scheduled transfer lifecycle rules
//!
//! Pure functions over [`ScheduledTransfer`], keyed on the schedule kind. The
//! orchestrator decides what to run and persists results; everything about
//! which state follows which outcome lives here.

use crate::types::{Schedule, ScheduledTransfer, TransferError, TransferStatus};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};

/// Result of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded { at: NaiveDateTime },
    Failed { at: NaiveDateTime },
}

/// Whether `transfer` is due and allowed to run at `now`
///
/// A recurring entry whose next date lies beyond its end date never runs again;
/// the expiry sweep completes it.
pub fn is_executable(transfer: &ScheduledTransfer, now: NaiveDateTime) -> bool {
    if transfer.core.status != TransferStatus::Active {
        return false;
    }
    match &transfer.schedule {
        Schedule::Recurring(recurring) => {
            recurring.next_execution_date <= now.date()
                && recurring.next_execution_date <= recurring.end_date
        }
        Schedule::Reserved(reserved) => reserved.reserved_at <= now,
    }
}

/// Whether an ACTIVE recurring entry's validity window closed before `today`
pub fn is_expired(transfer: &ScheduledTransfer, today: NaiveDate) -> bool {
    transfer.core.status == TransferStatus::Active
        && transfer
            .as_recurring()
            .is_some_and(|recurring| recurring.end_date < today)
}

/// Apply the outcome of an execution attempt and return the resulting status
///
/// Success resets the failure count. A reserved entry completes; a recurring entry
/// completes once the attempt happens on or after its end date, otherwise its next
/// execution date moves to the first monthly date after the attempt.
///
/// Failure increments the failure count and pauses the entry at `max_failures`.
/// A recurring entry that stays ACTIVE waits for its next monthly date; a reserved
/// entry stays due and is retried on the next poll.
///
/// # Errors
///
/// `InvalidDateRange` if the next monthly date falls outside the calendar range.
pub fn apply_outcome(
    transfer: &mut ScheduledTransfer,
    outcome: ExecutionOutcome,
    max_failures: u32,
) -> Result<TransferStatus, TransferError> {
    match outcome {
        ExecutionOutcome::Succeeded { at } => {
            transfer.core.failure_count = 0;
            match &mut transfer.schedule {
                Schedule::Recurring(recurring) => {
                    if at.date() >= recurring.end_date {
                        transfer.core.status = TransferStatus::Completed;
                    } else {
                        recurring.next_execution_date = advance_past(
                            recurring.next_execution_date,
                            recurring.transfer_day,
                            at.date(),
                        )?;
                    }
                }
                Schedule::Reserved(reserved) => {
                    reserved.completed_at = Some(at);
                    transfer.core.status = TransferStatus::Completed;
                }
            }
        }
        ExecutionOutcome::Failed { at } => {
            transfer.core.failure_count = transfer.core.failure_count.saturating_add(1);
            if transfer.core.failure_count >= max_failures {
                transfer.core.status = TransferStatus::Paused;
            } else if let Schedule::Recurring(recurring) = &mut transfer.schedule {
                recurring.next_execution_date = advance_past(
                    recurring.next_execution_date,
                    recurring.transfer_day,
                    at.date(),
                )?;
            }
        }
    }
    Ok(transfer.core.status)
}

/// Mark an expired recurring entry COMPLETED
pub fn expire(transfer: &mut ScheduledTransfer) {
    transfer.core.status = TransferStatus::Completed;
}

/// Number of days in `month` of `year`
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some(last.day())
}

/// `day` of the given month, clamped to the month's last day
fn date_in_month(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let clamped = day.clamp(1, days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, clamped)
}

/// The monthly date in the month after `from`
///
/// `day` is the registered transfer day, so a day-31 schedule returns to the 31st
/// after passing through a shorter month.
pub fn next_monthly_date(from: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (year, month) = if from.month() == 12 {
        (from.year().checked_add(1)?, 1)
    } else {
        (from.year(), from.month() + 1)
    };
    date_in_month(year, month, day)
}

/// First monthly date on or after `start`
pub fn first_execution_date(start: NaiveDate, day: u32) -> Option<NaiveDate> {
    let candidate = date_in_month(start.year(), start.month(), day)?;
    if candidate >= start {
        Some(candidate)
    } else {
        next_monthly_date(start, day)
    }
}

/// Advance `from` monthly until it is strictly after `today`
fn advance_past(from: NaiveDate, day: u32, today: NaiveDate) -> Result<NaiveDate, TransferError> {
    let mut next = from;
    while next <= today {
        next = next_monthly_date(next, day)
            .ok_or_else(|| TransferError::invalid_date_range("next execution date out of range"))?;
    }
    Ok(next)
}
