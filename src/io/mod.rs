//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - row structures, conversion to domain types, output serialization
//! - `sync_reader` - streaming transfer reader and whole-file state loaders
//! - `async_reader` - asynchronous transfer reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::{AsyncReader, RequestBatch};
pub use csv_format::{
    convert_account_record, convert_schedule_record, convert_transfer_record, write_accounts_csv,
    write_schedule_csv, AccountCsvRecord, ScheduleCsvRecord, TransferCsvRecord,
};
pub use sync_reader::{read_accounts, read_schedule, SyncReader};
