//! Periodic interest-payout worker.
//!
//! One tokio task drives the batch on a fixed interval. Runs never
//! overlap: the next tick is not observed until the previous batch
//! returns. Shutdown is a watch signal; the engine checks it between
//! accounts, so a batch in flight stops at the next account boundary.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use bankd_core::BankError;
use bankd_store::LedgerStore;

use crate::engine::LedgerEngine;

/// Unit for the payout interval, as configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    fn seconds(&self) -> u64 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3_600,
            IntervalUnit::Days => 86_400,
            IntervalUnit::Weeks => 7 * 86_400,
            // Calendar-aware scheduling is not worth it for a payout
            // sweep; fixed 30/365-day approximations.
            IntervalUnit::Months => 30 * 86_400,
            IntervalUnit::Years => 365 * 86_400,
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "second" | "seconds" => Ok(IntervalUnit::Seconds),
            "minute" | "minutes" => Ok(IntervalUnit::Minutes),
            "hour" | "hours" => Ok(IntervalUnit::Hours),
            "day" | "days" => Ok(IntervalUnit::Days),
            "week" | "weeks" => Ok(IntervalUnit::Weeks),
            "month" | "months" => Ok(IntervalUnit::Months),
            "year" | "years" => Ok(IntervalUnit::Years),
            other => Err(BankError::unprocessable(format!(
                "unknown interval unit: {other}"
            ))),
        }
    }
}

/// How often the worker runs a payout batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub interval: u64,
    pub unit: IntervalUnit,
}

impl WorkerConfig {
    pub fn new(interval: u64, unit: IntervalUnit) -> Self {
        Self { interval, unit }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval.max(1) * self.unit.seconds())
    }
}

/// Counters accumulated over the worker's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub runs: u64,
    pub accounts_paid: u64,
    /// Batches that aborted on a store-level failure.
    pub failed_runs: u64,
}

/// Handle to a spawned [`PayoutWorker`] task.
pub struct PayoutWorkerHandle {
    join: JoinHandle<WorkerStats>,
}

impl PayoutWorkerHandle {
    /// Wait for the worker to observe shutdown and return its stats.
    pub async fn join(self) -> WorkerStats {
        self.join.await.unwrap_or_default()
    }
}

/// Periodic driver for [`LedgerEngine::interest_payout`].
pub struct PayoutWorker<S: LedgerStore> {
    engine: LedgerEngine<S>,
    config: WorkerConfig,
}

impl<S: LedgerStore> PayoutWorker<S> {
    pub fn new(engine: LedgerEngine<S>, config: WorkerConfig) -> Self {
        Self { engine, config }
    }

    /// Spawn the worker loop. It runs until `shutdown` flips to `true`.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> PayoutWorkerHandle {
        let join = tokio::spawn(self.run(shutdown));
        PayoutWorkerHandle { join }
    }

    #[instrument(skip_all, fields(period = ?self.config.period()))]
    async fn run(self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut ticker = tokio::time::interval(self.config.period());
        // The first tick of a tokio interval fires immediately; consume
        // it so the first batch runs one full period after startup.
        ticker.tick().await;

        info!("payout worker started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A closed channel means the sender is gone; stop
                    // rather than spin on an error that never clears.
                    if changed.is_err() || *shutdown.borrow() {
                        info!(runs = stats.runs, "payout worker stopping");
                        return stats;
                    }
                }
                _ = ticker.tick() => {
                    stats.runs += 1;
                    match self.engine.interest_payout(Some(&shutdown)).await {
                        Ok(run) => {
                            info!(
                                considered = run.considered,
                                paid = run.paid,
                                "payout batch finished"
                            );
                            stats.accounts_paid += run.paid as u64;
                        }
                        Err(err) => {
                            stats.failed_runs += 1;
                            error!(error = %err, "payout batch aborted");
                        }
                    }
                }
            }
        }
    }
}

/// Convenience for callers holding only a store.
pub fn spawn_payout_worker<S: LedgerStore>(
    store: Arc<S>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
) -> PayoutWorkerHandle {
    PayoutWorker::new(LedgerEngine::new(store), config).spawn(shutdown)
}
