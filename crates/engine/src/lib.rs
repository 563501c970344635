//! `bankd-engine` — the ledger transaction engine.
//!
//! Composes the transaction log and account mutations into the
//! deposit/withdrawal/interest-payout protocols, owning the commit/rollback
//! decision. Also hosts user provisioning and the periodic payout worker.

pub mod engine;
pub mod users;
pub mod worker;

pub use engine::{LedgerEngine, PayoutRun, MAX_MOVEMENT_AMOUNT};
pub use users::{UserDetail, UserService};
pub use worker::{
    spawn_payout_worker, IntervalUnit, PayoutWorker, PayoutWorkerHandle, WorkerConfig, WorkerStats,
};
