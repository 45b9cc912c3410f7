//! Synchronous processing strategy
//!
//! Streams the transfer file through `SyncReader` and executes each request on the
//! calling thread, in file order. Memory use does not grow with the input.

use crate::core::TransferEngine;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ProcessingSummary};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Single-threaded, in-order strategy
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        engine: &TransferEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, String> {
        let reader = SyncReader::new(input_path)?;
        let mut summary = ProcessingSummary::default();

        for row in reader {
            let result = row.and_then(|request| {
                engine
                    .executor()
                    .execute(&request)
                    .map_err(|e| e.to_string())
            });
            if let Err(e) = &result {
                warn!(error = %e, "transfer rejected");
            }
            summary.record(&result);
        }

        info!(
            executed = summary.executed,
            rejected = summary.rejected,
            "transfer file processed"
        );

        write_accounts_csv(&engine.store().accounts(), output)?;

        Ok(summary)
    }
}
