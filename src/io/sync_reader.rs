//! Synchronous CSV readers
//!
//! `SyncReader` streams transfer requests one row at a time. `read_accounts` and
//! `read_schedule` load the (small) state files whole.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned as `Err`
//! - `SyncReader` yields per-row errors with their line number
//! - The whole-file loaders log invalid rows with their line number and skip them
//!
//! ```no_run
//! use funds_transfer_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("transfers.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(request) => println!("Transfer of {}", request.amount),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

use crate::io::csv_format::{
    convert_account_record, convert_schedule_record, convert_transfer_record, AccountCsvRecord,
    ScheduleCsvRecord, TransferCsvRecord,
};
use crate::types::{Account, ExecuteTransferRequest, ScheduledTransfer};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use tracing::warn;

fn open_csv(path: &Path) -> Result<csv::Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file))
}

/// Streaming reader over transfer request rows
///
/// Memory use is constant in the file size.
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl SyncReader {
    /// Open a transfer request file
    ///
    /// # Errors
    ///
    /// Returns an error message if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(Self {
            reader: open_csv(path)?,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<ExecuteTransferRequest, String>;

    /// Next request, or the reason its row could not be used
    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<TransferCsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        Some(match row {
            Ok(record) => {
                convert_transfer_record(record).map_err(|e| format!("Line {}: {}", self.line_num, e))
            }
            Err(e) => Err(format!("Line {}: CSV parse error: {}", self.line_num, e)),
        })
    }
}

fn read_all<R, T>(path: &Path, convert: fn(R) -> Result<T, String>) -> Result<Vec<T>, String>
where
    R: DeserializeOwned,
{
    let mut reader = open_csv(path)?;
    let mut items = Vec::new();

    for (index, row) in reader.deserialize::<R>().enumerate() {
        let line = index + 2;
        match row.map_err(|e| format!("CSV parse error: {}", e)).and_then(convert) {
            Ok(item) => items.push(item),
            Err(e) => warn!(file = %path.display(), line, error = %e, "skipping row"),
        }
    }

    Ok(items)
}

/// Load every valid account row of `path`
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, String> {
    read_all::<AccountCsvRecord, _>(path, convert_account_record)
}

/// Load every valid scheduled transfer row of `path`
pub fn read_schedule(path: &Path) -> Result<Vec<ScheduledTransfer>, String> {
    read_all::<ScheduleCsvRecord, _>(path, convert_schedule_record)
}
