//! `bankd-ledger` — pure ledger domain model.
//!
//! Accounts, transaction-log entries, and interest accrual math. No
//! infrastructure concerns; everything here is deterministic and
//! synchronous.

pub mod account;
pub mod entry;
pub mod interest;

pub use account::Account;
pub use entry::{EntryAction, EntryStatus, EntryType, LedgerEntry};
pub use interest::accrued_interest;
