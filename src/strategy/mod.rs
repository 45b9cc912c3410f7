//! Processing strategy module for transfer files
//!
//! A strategy reads transfer requests from a CSV file, executes them against a
//! [`TransferEngine`] and writes the resulting account states. The synchronous
//! strategy executes requests one after another; the asynchronous one executes each
//! batch concurrently and relies on the engine's account locks for consistency.

use crate::cli::StrategyType;
use crate::core::TransferEngine;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Counts of one processing run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// Transfers committed
    pub executed: usize,
    /// Transfers the engine refused, and rows that could not be parsed
    pub rejected: usize,
}

impl ProcessingSummary {
    pub(crate) fn record<T, E>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.executed += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Transfer file processing pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Execute every request of `input_path` and write final account states
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine holding the accounts the requests refer to
    /// * `input_path` - CSV file with `source,destination,amount,secret` rows
    /// * `output` - Destination of the account state CSV
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be opened or the output cannot be
    /// written. Rejected transfers and malformed rows are logged and counted instead.
    fn process(
        &self,
        engine: &TransferEngine,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<ProcessingSummary, String>;
}

/// Build the strategy selected on the command line
///
/// `config` is only used by the asynchronous strategy; `None` means defaults.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(config.unwrap_or_default())),
    }
}
