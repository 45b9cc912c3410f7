use crate::strategy::BatchConfig;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "funds-transfer-engine")]
#[command(about = "Execute account transfers and scheduled transfer sweeps", long_about = None)]
pub struct CliArgs {
    #[arg(
        long = "config",
        value_name = "FILE",
        global = true,
        help = "JSON engine configuration (defaults apply when omitted)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a file of immediate transfers and print the final account states
    Transfer(TransferArgs),

    /// Run the daily cycle and the reserved sweep once, at a given time
    Sweep(SweepArgs),

    /// Run the periodic sweep scheduler for a fixed duration
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[arg(value_name = "ACCOUNTS", help = "Path to the accounts CSV file")]
    pub accounts_file: PathBuf,

    #[arg(value_name = "TRANSFERS", help = "Path to the transfer requests CSV file")]
    pub transfers_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Processing strategy: 'sync' for in-order or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of transfers per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of transfers executing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[arg(value_name = "ACCOUNTS", help = "Path to the accounts CSV file")]
    pub accounts_file: PathBuf,

    #[arg(value_name = "SCHEDULE", help = "Path to the scheduled transfers CSV file")]
    pub schedule_file: PathBuf,

    #[arg(
        long = "at",
        value_name = "DATETIME",
        value_parser = parse_datetime,
        help = "Time the sweeps run at, e.g. 2024-05-10T09:00:00"
    )]
    pub at: NaiveDateTime,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[arg(value_name = "ACCOUNTS", help = "Path to the accounts CSV file")]
    pub accounts_file: PathBuf,

    #[arg(value_name = "SCHEDULE", help = "Path to the scheduled transfers CSV file")]
    pub schedule_file: PathBuf,

    #[arg(
        long = "for-secs",
        value_name = "SECONDS",
        default_value_t = 60,
        help = "How long the scheduler runs before states are printed"
    )]
    pub for_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, crate::io::csv_format::DATETIME_FORMAT)
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM:SS: {}", e))
}

impl TransferArgs {
    /// Convert CLI arguments to a `BatchConfig`
    ///
    /// Values not given on the command line take their defaults.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}
