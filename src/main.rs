//! Funds Transfer Engine CLI
//!
//! # Usage
//!
//! ```bash
//! cargo run -- transfer accounts.csv transfers.csv > accounts_out.csv
//! cargo run -- transfer --strategy async --batch-size 500 accounts.csv transfers.csv
//! cargo run -- sweep accounts.csv schedule.csv --at 2024-05-10T09:00:00
//! cargo run -- --config engine.json watch accounts.csv schedule.csv --for-secs 300
//! ```
//!
//! Final states are written to stdout as CSV; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable input or configuration, unwritable output)

use funds_transfer_engine::cli::{self, Command};
use funds_transfer_engine::config::EngineConfig;
use funds_transfer_engine::logging::init_tracing;
use std::process;

fn main() {
    let args = cli::parse_args();

    let config = match EngineConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    init_tracing(&config.log_level);
    let config = config.normalized();

    let mut output = std::io::stdout();
    let result = match &args.command {
        Command::Transfer(transfer) => cli::run_transfer(transfer, &config, &mut output).map(|_| ()),
        Command::Sweep(sweep) => cli::run_sweep(sweep, &config, &mut output),
        Command::Watch(watch) => cli::run_watch(watch, &config, &mut output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
