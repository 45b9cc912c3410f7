//! CSV format handling for accounts, transfer requests and scheduled transfers
//!
//! This module centralizes all CSV format concerns, providing:
//! - Row structures for deserialization
//! - Conversion from rows to domain types
//! - Account and scheduled-transfer output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Formats
//!
//! ```text
//! accounts:  id,user_id,holder_name,account_number,status,balance,transfer_limit,
//!            daily_transfer_limit,daily_transferred_amount,secret
//! transfers: source,destination,amount,secret
//! schedule:  id,kind,user_id,from_account_id,to_account_number,amount,description,status,
//!            failure_count,transfer_day,next_execution_date,start_date,end_date,
//!            reserved_at,completed_at
//! ```
//!
//! Dates are `YYYY-MM-DD`; instants are `YYYY-MM-DDTHH:MM:SS`.

use crate::core::lifecycle::first_execution_date;
use crate::types::{
    validate_account_number, Account, AccountId, AccountStatus, ExecuteTransferRequest,
    RecurringSchedule, ReservedSchedule, Schedule, ScheduledTransfer, ScheduledTransferId,
    TransferRequestCore, TransferStatus, UserId,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Output format of instants
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Account row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountCsvRecord {
    pub id: AccountId,
    pub user_id: UserId,
    pub holder_name: String,
    pub account_number: String,
    pub status: String,
    pub balance: String,
    pub transfer_limit: String,
    pub daily_transfer_limit: String,
    pub daily_transferred_amount: Option<String>,
    pub secret: String,
}

/// Immediate transfer request row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransferCsvRecord {
    pub source: AccountId,
    pub destination: String,
    pub amount: String,
    pub secret: String,
}

/// Scheduled transfer row
///
/// Variant-specific columns are optional; which ones are required depends on `kind`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScheduleCsvRecord {
    pub id: ScheduledTransferId,
    pub kind: String,
    pub user_id: UserId,
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub failure_count: Option<u32>,
    pub transfer_day: Option<u32>,
    pub next_execution_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub reserved_at: Option<String>,
    pub completed_at: Option<String>,
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("Invalid {} '{}'", field, value))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid {} '{}'", field, value))
}

fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
        .map_err(|_| format!("Invalid {} '{}'", field, value))
}

/// `Some` for a present, non-blank column
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &str, id: ScheduledTransferId) -> Result<&'a str, String> {
    present(value).ok_or_else(|| format!("Scheduled transfer {} requires {}", id, field))
}

fn parse_account_status(value: &str) -> Result<AccountStatus, String> {
    match value.to_uppercase().as_str() {
        "ACTIVE" => Ok(AccountStatus::Active),
        "DORMANT" => Ok(AccountStatus::Dormant),
        "BLOCKED" => Ok(AccountStatus::Blocked),
        "CLOSED" => Ok(AccountStatus::Closed),
        _ => Err(format!("Invalid account status '{}'", value)),
    }
}

fn parse_transfer_status(value: &str) -> Result<TransferStatus, String> {
    match value.to_uppercase().as_str() {
        "ACTIVE" => Ok(TransferStatus::Active),
        "PAUSED" => Ok(TransferStatus::Paused),
        "COMPLETED" => Ok(TransferStatus::Completed),
        "FAILED" => Ok(TransferStatus::Failed),
        _ => Err(format!("Invalid transfer status '{}'", value)),
    }
}

/// Convert an account row
///
/// Checks the account number format and that no amount is negative.
pub fn convert_account_record(record: AccountCsvRecord) -> Result<Account, String> {
    validate_account_number(&record.account_number).map_err(|e| e.to_string())?;

    let balance = parse_amount("balance", &record.balance)?;
    let transfer_limit = parse_amount("transfer_limit", &record.transfer_limit)?;
    let daily_transfer_limit = parse_amount("daily_transfer_limit", &record.daily_transfer_limit)?;
    let daily_transferred_amount = match present(&record.daily_transferred_amount) {
        Some(value) => parse_amount("daily_transferred_amount", value)?,
        None => Decimal::ZERO,
    };

    for (field, value) in [
        ("balance", balance),
        ("transfer_limit", transfer_limit),
        ("daily_transfer_limit", daily_transfer_limit),
        ("daily_transferred_amount", daily_transferred_amount),
    ] {
        if value < Decimal::ZERO {
            return Err(format!("Account {} has negative {}", record.id, field));
        }
    }

    Ok(Account {
        id: record.id,
        user_id: record.user_id,
        holder_name: record.holder_name,
        account_number: record.account_number,
        status: parse_account_status(&record.status)?,
        balance,
        transfer_limit,
        daily_transfer_limit,
        daily_transferred_amount,
        secret_hash: record.secret,
    })
}

/// Convert a transfer request row
pub fn convert_transfer_record(record: TransferCsvRecord) -> Result<ExecuteTransferRequest, String> {
    Ok(ExecuteTransferRequest {
        source_account_id: record.source,
        destination_account_number: record.destination,
        amount: parse_amount("amount", &record.amount)?,
        secret: record.secret,
    })
}

/// Convert a scheduled transfer row
///
/// Rows describe stored state, so no registration rules are re-applied. Missing
/// status means ACTIVE; a recurring row without `next_execution_date` starts at
/// its first monthly date.
pub fn convert_schedule_record(record: ScheduleCsvRecord) -> Result<ScheduledTransfer, String> {
    let id = record.id;
    let schedule = match record.kind.to_lowercase().as_str() {
        "recurring" => {
            let transfer_day = record
                .transfer_day
                .ok_or_else(|| format!("Scheduled transfer {} requires transfer_day", id))?;
            let start_date = parse_date("start_date", required(&record.start_date, "start_date", id)?)?;
            let end_date = parse_date("end_date", required(&record.end_date, "end_date", id)?)?;
            let next_execution_date = match present(&record.next_execution_date) {
                Some(value) => parse_date("next_execution_date", value)?,
                None => first_execution_date(start_date, transfer_day)
                    .ok_or_else(|| format!("Scheduled transfer {} has no valid first date", id))?,
            };
            Schedule::Recurring(RecurringSchedule {
                transfer_day,
                next_execution_date,
                start_date,
                end_date,
            })
        }
        "reserved" => {
            let reserved_at =
                parse_datetime("reserved_at", required(&record.reserved_at, "reserved_at", id)?)?;
            let completed_at = present(&record.completed_at)
                .map(|value| parse_datetime("completed_at", value))
                .transpose()?;
            Schedule::Reserved(ReservedSchedule {
                reserved_at,
                completed_at,
            })
        }
        _ => {
            return Err(format!(
                "Invalid schedule kind '{}' for scheduled transfer {}",
                record.kind, id
            ))
        }
    };

    let status = match present(&record.status) {
        Some(value) => parse_transfer_status(value)?,
        None => TransferStatus::Active,
    };

    Ok(ScheduledTransfer {
        id,
        core: TransferRequestCore {
            user_id: record.user_id,
            from_account_id: record.from_account_id,
            to_account_number: record.to_account_number,
            amount: parse_amount("amount", &record.amount)?,
            description: record.description.unwrap_or_default(),
            status,
            failure_count: record.failure_count.unwrap_or(0),
        },
        schedule,
    })
}

/// Write account states to CSV format
///
/// Columns: id, account_number, status, balance, daily_transferred_amount.
/// Accounts are sorted by id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "id",
            "account_number",
            "status",
            "balance",
            "daily_transferred_amount",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                account.account_number.clone(),
                account.status.to_string(),
                format!("{:.4}", account.balance),
                format!("{:.4}", account.daily_transferred_amount),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write scheduled transfer states to CSV format
///
/// Columns: id, kind, status, failure_count, next_execution_date, completed_at.
/// The last two are empty where they do not apply.
pub fn write_schedule_csv(
    transfers: &[ScheduledTransfer],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "id",
            "kind",
            "status",
            "failure_count",
            "next_execution_date",
            "completed_at",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = transfers.to_vec();
    sorted.sort_by_key(|transfer| transfer.id);

    for transfer in sorted {
        let (next_execution_date, completed_at) = match &transfer.schedule {
            Schedule::Recurring(recurring) => (recurring.next_execution_date.to_string(), String::new()),
            Schedule::Reserved(reserved) => (
                String::new(),
                reserved
                    .completed_at
                    .map(|at| at.format(DATETIME_FORMAT).to_string())
                    .unwrap_or_default(),
            ),
        };
        writer
            .write_record(&[
                transfer.id.to_string(),
                transfer.kind().to_string(),
                transfer.core.status.to_string(),
                transfer.core.failure_count.to_string(),
                next_execution_date,
                completed_at,
            ])
            .map_err(|e| format!("Failed to write scheduled transfer record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn account_row() -> AccountCsvRecord {
        AccountCsvRecord {
            id: 1,
            user_id: 7,
            holder_name: "Choi".to_string(),
            account_number: "100000000000001".to_string(),
            status: "active".to_string(),
            balance: "10000".to_string(),
            transfer_limit: "5000".to_string(),
            daily_transfer_limit: "10000".to_string(),
            daily_transferred_amount: None,
            secret: "1234".to_string(),
        }
    }

    fn schedule_row(kind: &str) -> ScheduleCsvRecord {
        ScheduleCsvRecord {
            id: 3,
            kind: kind.to_string(),
            user_id: 7,
            from_account_id: 1,
            to_account_number: "100000000000002".to_string(),
            amount: "1000".to_string(),
            description: None,
            status: None,
            failure_count: None,
            transfer_day: Some(25),
            next_execution_date: None,
            start_date: Some("2024-01-10".to_string()),
            end_date: Some("2024-12-31".to_string()),
            reserved_at: Some("2024-02-01T09:30:00".to_string()),
            completed_at: None,
        }
    }

    #[test]
    fn test_convert_account_record() {
        let account = convert_account_record(account_row()).unwrap();

        assert_eq!(account.id, 1);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.balance, Decimal::new(10000, 0));
        assert_eq!(account.daily_transferred_amount, Decimal::ZERO);
        assert_eq!(account.secret_hash, "1234");
    }

    #[rstest]
    #[case::bad_number(|r: &mut AccountCsvRecord| r.account_number = "123".to_string(), "Invalid account number")]
    #[case::bad_status(|r: &mut AccountCsvRecord| r.status = "frozen".to_string(), "Invalid account status")]
    #[case::bad_balance(|r: &mut AccountCsvRecord| r.balance = "ten".to_string(), "Invalid balance")]
    #[case::negative_balance(|r: &mut AccountCsvRecord| r.balance = "-1".to_string(), "negative balance")]
    fn test_convert_account_record_errors(
        #[case] mutate: fn(&mut AccountCsvRecord),
        #[case] expected_error: &str,
    ) {
        let mut row = account_row();
        mutate(&mut row);

        let err = convert_account_record(row).unwrap_err();
        assert!(err.contains(expected_error), "{err}");
    }

    #[test]
    fn test_convert_transfer_record() {
        let request = convert_transfer_record(TransferCsvRecord {
            source: 1,
            destination: "100000000000002".to_string(),
            amount: " 250.5 ".to_string(),
            secret: "1234".to_string(),
        })
        .unwrap();

        assert_eq!(request.amount, Decimal::new(2505, 1));
        assert_eq!(request.destination_account_number, "100000000000002");
    }

    #[test]
    fn test_convert_recurring_schedule_defaults() {
        let transfer = convert_schedule_record(schedule_row("recurring")).unwrap();

        assert_eq!(transfer.core.status, TransferStatus::Active);
        assert_eq!(transfer.core.failure_count, 0);
        let recurring = transfer.as_recurring().unwrap();
        assert_eq!(
            recurring.next_execution_date,
            NaiveDate::from_ymd_opt(2024, 1, 25).unwrap()
        );
    }

    #[test]
    fn test_convert_reserved_schedule() {
        let mut row = schedule_row("RESERVED");
        row.status = Some("paused".to_string());
        row.failure_count = Some(3);

        let transfer = convert_schedule_record(row).unwrap();

        assert_eq!(transfer.core.status, TransferStatus::Paused);
        assert_eq!(transfer.core.failure_count, 3);
        assert_eq!(
            transfer.as_reserved().unwrap().reserved_at.format(DATETIME_FORMAT).to_string(),
            "2024-02-01T09:30:00"
        );
    }

    #[rstest]
    #[case::bad_kind("weekly", |_: &mut ScheduleCsvRecord| {}, "Invalid schedule kind")]
    #[case::missing_day("recurring", |r: &mut ScheduleCsvRecord| r.transfer_day = None, "requires transfer_day")]
    #[case::missing_end("recurring", |r: &mut ScheduleCsvRecord| r.end_date = Some(" ".to_string()), "requires end_date")]
    #[case::missing_instant("reserved", |r: &mut ScheduleCsvRecord| r.reserved_at = None, "requires reserved_at")]
    #[case::bad_instant("reserved", |r: &mut ScheduleCsvRecord| r.reserved_at = Some("tomorrow".to_string()), "Invalid reserved_at")]
    fn test_convert_schedule_record_errors(
        #[case] kind: &str,
        #[case] mutate: fn(&mut ScheduleCsvRecord),
        #[case] expected_error: &str,
    ) {
        let mut row = schedule_row(kind);
        mutate(&mut row);

        let err = convert_schedule_record(row).unwrap_err();
        assert!(err.contains(expected_error), "{err}");
    }

    #[test]
    fn test_write_accounts_csv_sorted_with_four_decimals() {
        let mut second = convert_account_record(account_row()).unwrap();
        second.id = 2;
        second.account_number = "100000000000002".to_string();
        second.balance = Decimal::new(12345, 1);
        let first = convert_account_record(account_row()).unwrap();

        let mut output = Vec::new();
        write_accounts_csv(&[second, first], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,account_number,status,balance,daily_transferred_amount\n\
             1,100000000000001,ACTIVE,10000.0000,0.0000\n\
             2,100000000000002,ACTIVE,1234.5000,0.0000\n"
        );
    }

    #[test]
    fn test_write_schedule_csv() {
        let recurring = convert_schedule_record(schedule_row("recurring")).unwrap();
        let mut reserved = convert_schedule_record(schedule_row("reserved")).unwrap();
        reserved.id = 4;
        reserved.core.status = TransferStatus::Completed;
        if let Schedule::Reserved(r) = &mut reserved.schedule {
            r.completed_at = Some(r.reserved_at);
        }

        let mut output = Vec::new();
        write_schedule_csv(&[reserved, recurring], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,kind,status,failure_count,next_execution_date,completed_at\n\
             3,recurring,ACTIVE,0,2024-01-25,\n\
             4,reserved,COMPLETED,0,,2024-02-01T09:30:00\n"
        );
    }
}
