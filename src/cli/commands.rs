//! Subcommand runners
//!
//! Each runner loads its input files into a fresh [`TransferEngine`], does its work
//! and writes the resulting states as CSV. `sweep` and `watch` print the account
//! table, a blank line, then the schedule table.

use super::args::{StrategyType, SweepArgs, TransferArgs, WatchArgs};
use crate::config::EngineConfig;
use crate::core::{FixedClock, SystemClock, TransferEngine};
use crate::io::{read_accounts, read_schedule, write_accounts_csv, write_schedule_csv};
use crate::scheduler::SweepScheduler;
use crate::strategy::{create_strategy, ProcessingSummary};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute a transfer file with the selected strategy
pub fn run_transfer(
    args: &TransferArgs,
    config: &EngineConfig,
    output: &mut dyn Write,
) -> Result<ProcessingSummary, String> {
    let accounts = read_accounts(&args.accounts_file)?;
    let engine = TransferEngine::with_accounts_now(accounts, config);

    let batch_config = match args.strategy {
        StrategyType::Async => Some(args.to_batch_config()),
        StrategyType::Sync => None,
    };
    let strategy = create_strategy(args.strategy, batch_config);

    strategy.process(&engine, &args.transfers_file, output)
}

/// Run the daily cycle, then the reserved sweep, with the clock stopped at `args.at`
pub fn run_sweep(
    args: &SweepArgs,
    config: &EngineConfig,
    output: &mut dyn Write,
) -> Result<(), String> {
    let engine = load_engine(
        &args.accounts_file,
        &args.schedule_file,
        Arc::new(FixedClock::new(args.at)),
        config,
    )?;

    let orchestrator = engine.orchestrator();
    let daily = orchestrator.run_daily_cycle();
    let reserved = orchestrator.run_reserved_sweep();
    info!(
        at = %args.at,
        accounts_reset = daily.accounts_reset,
        reset_failures = daily.reset_failures,
        recurring_executed = daily.recurring.succeeded,
        recurring_failed = daily.recurring.failed,
        expired = daily.expired.completed,
        reserved_executed = reserved.succeeded,
        reserved_failed = reserved.failed,
        "sweep finished"
    );

    write_states(&engine, output)
}

/// Run the sweep scheduler on the system clock for `args.for_secs` seconds
pub fn run_watch(
    args: &WatchArgs,
    config: &EngineConfig,
    output: &mut dyn Write,
) -> Result<(), String> {
    let engine = load_engine(
        &args.accounts_file,
        &args.schedule_file,
        Arc::new(SystemClock),
        config,
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

    let scheduler = SweepScheduler::from_config(Arc::clone(engine.orchestrator()), config);
    let cancel = CancellationToken::new();
    let deadline = Duration::from_secs(args.for_secs);

    runtime.block_on(async {
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            stopper.cancel();
        });
        scheduler.run(cancel).await;
    });

    write_states(&engine, output)
}

fn load_engine(
    accounts_file: &Path,
    schedule_file: &Path,
    clock: Arc<dyn crate::core::Clock>,
    config: &EngineConfig,
) -> Result<TransferEngine, String> {
    let engine = TransferEngine::with_accounts(read_accounts(accounts_file)?, clock, config);
    let loaded = engine
        .load_schedule(read_schedule(schedule_file)?)
        .map_err(|e| format!("Failed to load schedule: {}", e))?;
    info!(
        accounts = engine.store().account_count(),
        scheduled = loaded,
        "state loaded"
    );
    Ok(engine)
}

fn write_states(engine: &TransferEngine, output: &mut dyn Write) -> Result<(), String> {
    write_accounts_csv(&engine.store().accounts(), output)?;
    writeln!(output).map_err(|e| format!("Failed to write output: {}", e))?;
    write_schedule_csv(&engine.store().scheduled_transfers(), output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    const ACCOUNTS: &str = "id,user_id,holder_name,account_number,status,balance,transfer_limit,daily_transfer_limit,daily_transferred_amount,secret\n\
                            1,1,Kim,100000000000001,ACTIVE,10000,5000,10000,2000,pw\n\
                            2,2,Lee,100000000000002,ACTIVE,0,5000,10000,0,pw\n";

    #[test]
    fn test_run_transfer_sync() {
        let accounts = create_temp_csv(ACCOUNTS);
        let transfers = create_temp_csv(
            "source,destination,amount,secret\n\
             1,100000000000002,1000,pw\n",
        );
        let args = TransferArgs {
            accounts_file: accounts.path().to_path_buf(),
            transfers_file: transfers.path().to_path_buf(),
            strategy: StrategyType::Sync,
            batch_size: None,
            max_concurrent_batches: None,
        };
        let mut output = Vec::new();

        let summary = run_transfer(&args, &EngineConfig::default(), &mut output).unwrap();

        assert_eq!(summary.executed, 1);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("1,100000000000001,ACTIVE,9000.0000,3000.0000"), "{output}");
    }

    #[test]
    fn test_run_sweep_resets_limits_and_executes_due_entries() {
        let accounts = create_temp_csv(ACCOUNTS);
        let schedule = create_temp_csv(
            "id,kind,user_id,from_account_id,to_account_number,amount,description,status,failure_count,transfer_day,next_execution_date,start_date,end_date,reserved_at,completed_at\n\
             1,recurring,1,1,100000000000002,1000,rent,ACTIVE,0,10,2024-05-10,2024-01-01,2024-12-31,,\n\
             2,reserved,1,1,100000000000002,500,gift,ACTIVE,0,,,,,2024-05-10T08:00:00,\n\
             3,reserved,1,1,100000000000002,700,later,ACTIVE,0,,,,,2024-05-11T08:00:00,\n",
        );
        let args = SweepArgs {
            accounts_file: accounts.path().to_path_buf(),
            schedule_file: schedule.path().to_path_buf(),
            at: NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        let mut output = Vec::new();

        run_sweep(&args, &EngineConfig::default(), &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        let (accounts_csv, schedule_csv) = output.split_once("\n\n").unwrap();
        assert!(accounts_csv.contains("1,100000000000001,ACTIVE,8500.0000,1500.0000"), "{accounts_csv}");
        assert!(accounts_csv.contains("2,100000000000002,ACTIVE,1500.0000,0.0000"), "{accounts_csv}");
        assert!(schedule_csv.contains("1,recurring,ACTIVE,0,2024-06-10,"), "{schedule_csv}");
        assert!(schedule_csv.contains("2,reserved,COMPLETED,0,,2024-05-10T09:00:00"), "{schedule_csv}");
        assert!(schedule_csv.contains("3,reserved,ACTIVE,0,,"), "{schedule_csv}");
    }

    #[test]
    fn test_run_sweep_missing_schedule_file() {
        let accounts = create_temp_csv(ACCOUNTS);
        let args = SweepArgs {
            accounts_file: accounts.path().to_path_buf(),
            schedule_file: "nonexistent.csv".into(),
            at: NaiveDate::from_ymd_opt(2024, 5, 10)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        let mut output = Vec::new();

        let result = run_sweep(&args, &EngineConfig::default(), &mut output);

        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
