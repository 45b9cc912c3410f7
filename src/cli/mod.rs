// CLI module
// Command-line interface, argument parsing and subcommand runners

mod args;
mod commands;

pub use args::{CliArgs, Command, StrategyType, SweepArgs, TransferArgs, WatchArgs};
pub use commands::{run_sweep, run_transfer, run_watch};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints its message and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
