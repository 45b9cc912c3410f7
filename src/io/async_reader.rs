//! Asynchronous CSV reader with batch interface
//!
//! Reads transfer request rows in batches for the concurrent strategy.
//!
//! ```text
//! CSV Reader → AsyncReader → RequestBatch (requests + invalid row count)
//!                  ↓
//!           csv_format module
//!           (TransferCsvRecord, convert_transfer_record)
//! ```

use crate::io::csv_format::{convert_transfer_record, TransferCsvRecord};
use crate::types::ExecuteTransferRequest;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Requests read in one call, plus the rows dropped on the way
#[derive(Debug, Default)]
pub struct RequestBatch {
    pub requests: Vec<ExecuteTransferRequest>,
    /// Rows that failed to parse or convert
    pub invalid_rows: usize,
}

/// Asynchronous transfer request reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` requests
    ///
    /// Invalid rows are logged, counted and skipped. A batch without requests means
    /// end of input; it may still carry invalid rows found before the end.
    pub async fn read_batch(&mut self, batch_size: usize) -> RequestBatch {
        let mut batch = RequestBatch {
            requests: Vec::with_capacity(batch_size),
            invalid_rows: 0,
        };
        let mut records = self.csv_reader.deserialize::<TransferCsvRecord>();

        while batch.requests.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_transfer_record(csv_record) {
                    Ok(request) => batch.requests.push(request),
                    Err(e) => {
                        batch.invalid_rows += 1;
                        warn!(error = %e, "record conversion error");
                    }
                },
                Some(Err(e)) => {
                    batch.invalid_rows += 1;
                    warn!(error = %e, "CSV parse error");
                }
                None => break,
            }
        }

        batch
    }
}
