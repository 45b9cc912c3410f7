//! Timer driver for the scheduled-transfer sweeps
//!
//! `SweepScheduler` owns two tokio intervals: a short one for the reserved sweep
//! and a long one for the daily cycle. Both are served from one loop, so at most
//! one sweep runs at a time. Sweeps are synchronous and run on the blocking pool.
//!
//! The daily interval is anchored at the next local midnight of the orchestrator's
//! clock, so daily limits are cleared at day rollover and a restart does not clear
//! them a second time.

use crate::config::EngineConfig;
use crate::core::orchestrator::ScheduledTransferOrchestrator;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Periodic caller of the orchestrator's sweeps
pub struct SweepScheduler {
    orchestrator: Arc<ScheduledTransferOrchestrator>,
    reserved_interval: Duration,
    daily_interval: Duration,
}

impl SweepScheduler {
    pub fn new(
        orchestrator: Arc<ScheduledTransferOrchestrator>,
        reserved_interval: Duration,
        daily_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            reserved_interval,
            daily_interval,
        }
    }

    /// Scheduler using the intervals of `config`
    pub fn from_config(
        orchestrator: Arc<ScheduledTransferOrchestrator>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            orchestrator,
            config.reserved_poll_interval(),
            config.recurring_sweep_interval(),
        )
    }

    /// Run until `cancel` fires
    ///
    /// The reserved sweep runs at startup and then every reserved interval. The
    /// daily cycle first runs at the next midnight and then every daily interval.
    /// A sweep in progress finishes before cancellation is observed.
    pub async fn run(&self, cancel: CancellationToken) {
        let first_daily = until_next_midnight(self.orchestrator.now());
        let mut daily_ticker = interval_at(Instant::now() + first_daily, self.daily_interval);
        let mut reserved_ticker = interval(self.reserved_interval);
        daily_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        reserved_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            reserved_interval_ms = millis(self.reserved_interval),
            daily_interval_ms = millis(self.daily_interval),
            first_daily_in_ms = millis(first_daily),
            "sweep scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = daily_ticker.tick() => self.daily().await,
                _ = reserved_ticker.tick() => self.reserved().await,
            }
        }

        info!("sweep scheduler stopped");
    }

    async fn daily(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        match spawn_blocking(move || orchestrator.run_daily_cycle()).await {
            Ok(report) => info!(
                accounts_reset = report.accounts_reset,
                reset_failures = report.reset_failures,
                executed = report.recurring.succeeded,
                failed = report.recurring.failed,
                expired = report.expired.completed,
                "daily cycle done"
            ),
            Err(e) => error!(error = %e, "daily cycle task failed"),
        }
    }

    async fn reserved(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        if let Err(e) = spawn_blocking(move || orchestrator.run_reserved_sweep()).await {
            error!(error = %e, "reserved sweep task failed");
        }
    }
}

/// Time from `now` to the start of the next day
///
/// Exactly at midnight this is a full day, since the cycle for that day has already
/// been due.
pub fn until_next_midnight(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::executor::TransferExecutor;
    use crate::core::lock_table::AccountLockTable;
    use crate::core::verifier::PlainSecretVerifier;
    use crate::store::InMemoryStore;
    use crate::types::{Account, AccountStatus, ReservedRegistration, TransferStatus};
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn account(id: u64) -> Account {
        Account {
            id,
            user_id: id,
            holder_name: format!("holder-{id}"),
            account_number: format!("{:015}", id),
            status: AccountStatus::Active,
            balance: Decimal::new(5000, 0),
            transfer_limit: Decimal::new(5000, 0),
            daily_transfer_limit: Decimal::new(10000, 0),
            daily_transferred_amount: Decimal::ZERO,
            secret_hash: "pw".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_runs_reserved_sweep_until_cancelled() {
        let store = Arc::new(InMemoryStore::with_accounts(vec![account(1), account(2)]));
        let start = NaiveDate::from_ymd_opt(2024, 8, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let executor = TransferExecutor::new(
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            clock.clone(),
            Arc::new(AccountLockTable::new()),
            Duration::from_millis(100),
        );
        let orchestrator = Arc::new(ScheduledTransferOrchestrator::new(
            executor,
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            clock.clone(),
            3,
        ));
        let reservation = orchestrator
            .register_reserved(ReservedRegistration {
                user_id: 1,
                from_account_id: 1,
                to_account_number: format!("{:015}", 2),
                amount: Decimal::new(700, 0),
                description: String::new(),
                reserved_at: start + ChronoDuration::minutes(1),
                secret: "pw".to_string(),
            })
            .unwrap();
        clock.advance(ChronoDuration::minutes(1));

        let scheduler = SweepScheduler::new(
            orchestrator.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let done = orchestrator.find(reservation.id).unwrap();
        assert_eq!(done.core.status, TransferStatus::Completed);
        // Executed exactly once despite several polls
        assert_eq!(store.accounts()[0].balance, Decimal::new(4300, 0));
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, sec)
            .unwrap()
    }

    #[rstest]
    #[case::morning(at(2024, 8, 1, 8, 0, 0), Duration::from_secs(16 * 3600))]
    #[case::last_second(at(2024, 8, 1, 23, 59, 59), Duration::from_secs(1))]
    #[case::at_midnight(at(2024, 8, 1, 0, 0, 0), Duration::from_secs(24 * 3600))]
    #[case::month_end(at(2024, 2, 29, 12, 30, 0), Duration::from_secs(11 * 3600 + 30 * 60))]
    fn test_until_next_midnight(#[case] now: NaiveDateTime, #[case] expected: Duration) {
        assert_eq!(until_next_midnight(now), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_daily_cycle_does_not_run_at_startup() {
        let mut used = account(1);
        used.daily_transferred_amount = Decimal::new(4000, 0);
        let store = Arc::new(InMemoryStore::with_accounts(vec![used, account(2)]));
        let clock = Arc::new(FixedClock::new(at(2024, 8, 1, 8, 0, 0)));
        let executor = TransferExecutor::new(
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            clock.clone(),
            Arc::new(AccountLockTable::new()),
            Duration::from_millis(100),
        );
        let orchestrator = Arc::new(ScheduledTransferOrchestrator::new(
            executor,
            store.clone(),
            store.clone(),
            Arc::new(PlainSecretVerifier),
            clock,
            3,
        ));

        let scheduler = SweepScheduler::new(
            orchestrator,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // Midnight is sixteen hours away on the orchestrator's clock
        assert_eq!(store.accounts()[0].daily_transferred_amount, Decimal::new(4000, 0));
    }
}
