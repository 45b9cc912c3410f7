//! Asynchronous batch processing strategy
//!
//! Reads the transfer file in batches and executes the requests of each batch
//! concurrently on tokio's blocking pool.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── TransferExecutor (shared, cloned per task)
//!         └── AccountLockTable (ascending-id locking across tasks)
//! ```
//!
//! # Ordering
//!
//! Batches are processed one after another, so every request of a batch completes
//! before any request of the next batch starts. Inside a batch the order is not
//! defined: two transfers that compete for the same balance may be applied in
//! either order. Final balances are the same whenever every request succeeds.

use crate::core::TransferEngine;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::{ProcessingStrategy, ProcessingSummary};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of requests read per batch
    pub batch_size: usize,

    /// Maximum number of requests of one batch executing at the same time
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a configuration, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Batched, concurrent strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        engine: &TransferEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let summary = runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures-io, tokio files implement tokio-io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);
            let mut summary = ProcessingSummary::default();

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                summary.rejected += batch.invalid_rows;
                if batch.requests.is_empty() {
                    break;
                }

                let results: Vec<_> = stream::iter(batch.requests)
                    .map(|request| {
                        let executor = engine.executor().clone();
                        spawn_blocking(move || executor.execute(&request))
                    })
                    .buffer_unordered(self.config.max_concurrent_batches)
                    .collect()
                    .await;

                for joined in results {
                    match joined {
                        Ok(result) => {
                            if let Err(e) = &result {
                                warn!(error = %e, "transfer rejected");
                            }
                            summary.record(&result);
                        }
                        Err(e) => {
                            error!(error = %e, "transfer task failed");
                            summary.rejected += 1;
                        }
                    }
                }
            }

            Ok::<_, String>(summary)
        })?;

        info!(
            executed = summary.executed,
            rejected = summary.rejected,
            "transfer file processed"
        );

        write_accounts_csv(&engine.store().accounts(), output)?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::{Account, AccountStatus};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn account(id: u64, balance: i64) -> Account {
        Account {
            id,
            user_id: id,
            holder_name: format!("holder-{id}"),
            account_number: format!("{:015}", 100_000_000_000_000 + id),
            status: AccountStatus::Active,
            balance: Decimal::new(balance, 0),
            transfer_limit: Decimal::new(5_000, 0),
            daily_transfer_limit: Decimal::new(100_000, 0),
            daily_transferred_amount: Decimal::ZERO,
            secret_hash: "pw".to_string(),
        }
    }

    #[rstest]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_concurrency(10, 0, 10, num_cpus::get())]
    #[case::both_valid(10, 4, 10, 4)]
    fn test_batch_config_new(
        #[case] batch_size: usize,
        #[case] max_concurrent: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = BatchConfig::new(batch_size, max_concurrent);

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_async_strategy_reciprocal_transfers_across_batches() {
        let mut content = String::from("source,destination,amount,secret\n");
        for _ in 0..20 {
            content.push_str("1,100000000000002,100,pw\n");
            content.push_str("2,100000000000001,100,pw\n");
        }
        let file = create_temp_csv(&content);
        let engine = TransferEngine::with_accounts_now(
            vec![account(1, 5_000), account(2, 5_000)],
            &EngineConfig::default(),
        );
        let strategy = AsyncProcessingStrategy::new(BatchConfig::new(7, 4));
        let mut output = Vec::new();

        let summary = strategy.process(&engine, file.path(), &mut output).unwrap();

        assert_eq!(summary, ProcessingSummary { executed: 40, rejected: 0 });
        let accounts = engine.store().accounts();
        assert_eq!(accounts[0].balance, Decimal::new(5_000, 0));
        assert_eq!(accounts[1].balance, Decimal::new(5_000, 0));
        assert_eq!(engine.history().for_account(1).len(), 40);
    }

    #[test]
    fn test_async_strategy_writes_account_states() {
        let file = create_temp_csv(
            "source,destination,amount,secret\n\
             1,100000000000002,250.5,pw\n\
             1,100000000000002,1,nope\n",
        );
        let engine = TransferEngine::with_accounts_now(
            vec![account(1, 1_000), account(2, 0)],
            &EngineConfig::default(),
        );
        let mut output = Vec::new();

        let summary = AsyncProcessingStrategy::new(BatchConfig::default())
            .process(&engine, file.path(), &mut output)
            .unwrap();

        assert_eq!(summary, ProcessingSummary { executed: 1, rejected: 1 });
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("1,100000000000001,ACTIVE,749.5000,250.5000"), "{output}");
        assert!(output.contains("2,100000000000002,ACTIVE,250.5000,0.0000"), "{output}");
    }

    #[test]
    fn test_async_strategy_counts_rejections_and_bad_rows() {
        let file = create_temp_csv(
            "source,destination,amount,secret\n\
             1,100000000000002,100,pw\n\
             1,100000000000002,100,wrong\n\
             1,100000000000009,100,pw\n\
             1,100000000000002,lots,pw\n",
        );
        let engine = TransferEngine::with_accounts_now(
            vec![account(1, 1_000), account(2, 0)],
            &EngineConfig::default(),
        );
        let mut output = Vec::new();

        let summary = AsyncProcessingStrategy::new(BatchConfig::new(1, 2))
            .process(&engine, file.path(), &mut output)
            .unwrap();

        assert_eq!(summary, ProcessingSummary { executed: 1, rejected: 3 });
        assert_eq!(engine.store().accounts()[1].balance, Decimal::new(100, 0));
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let engine = TransferEngine::with_accounts_now(Vec::new(), &EngineConfig::default());
        let mut output = Vec::new();

        let result = AsyncProcessingStrategy::new(BatchConfig::default()).process(
            &engine,
            Path::new("nonexistent.csv"),
            &mut output,
        );

        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
