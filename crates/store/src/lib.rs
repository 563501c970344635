//! `bankd-store` — persistent account, user, and transaction-log storage.
//!
//! The [`LedgerStore`] trait is the engine's only view of persistence. It
//! exposes atomic read/write primitives plus an explicit transactional
//! scope; the commit/rollback decision always belongs to the caller.
//!
//! Two implementations: [`PgLedgerStore`] (PostgreSQL via sqlx) and
//! [`MemoryLedgerStore`] (staged-write scopes over process memory, used by
//! engine and router tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bankd_auth::{Credential, Role, User};
use bankd_core::{EntryId, UserId};
use bankd_ledger::{Account, EntryStatus, LedgerEntry};

pub mod codec;
pub mod error;
pub mod memory;
pub mod postgres;

pub use codec::{FieldCodec, PlainCodec};
pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Isolation level requested for a scope.
///
/// Request-path mutations run read-committed; per-account interest payout
/// requests serializable because it reads-then-writes both the balance and
/// the payout timestamp and must not race a concurrent deposit/withdrawal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Isolation {
    ReadCommitted,
    Serializable,
}

/// Offset/limit window for account scans.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

/// Persistent store for accounts, users, and the transaction log.
///
/// `Scope` is an atomic unit of work: nothing staged through a scope is
/// observable until `commit`, and `rollback` (or dropping the scope)
/// discards it. Scopes are never shared across concurrent operations.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Scope: Send;

    async fn begin(&self, isolation: Isolation) -> Result<Self::Scope, StoreError>;
    async fn commit(&self, scope: Self::Scope) -> Result<(), StoreError>;
    async fn rollback(&self, scope: Self::Scope) -> Result<(), StoreError>;

    // Users.
    async fn count_users(&self) -> Result<u64, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_credential(&self, user_id: UserId) -> Result<Option<Credential>, StoreError>;
    async fn create_user(
        &self,
        user: &User,
        credential: &Credential,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError>;
    async fn update_user_role(&self, username: &str, role: Role) -> Result<(), StoreError>;

    // Accounts.
    async fn find_account_by_user(&self, user_id: UserId) -> Result<Option<Account>, StoreError>;
    /// Scoped account read. Balance math must start from this read, never
    /// from a pool-direct one: on Postgres it locks the row (`FOR UPDATE`),
    /// and the memory store records the version seen so a concurrent commit
    /// invalidates this scope's staged writes.
    async fn find_account_by_user_in(
        &self,
        user_id: UserId,
        scope: &mut Self::Scope,
    ) -> Result<Option<Account>, StoreError>;
    async fn create_account(
        &self,
        account: &Account,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError>;
    async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, StoreError>;
    async fn update_balance(
        &self,
        user_id: UserId,
        balance: Decimal,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError>;
    /// Write the post-payout balance and advance the payout timestamp in one
    /// statement. Splitting these would corrupt the accrual interval on a
    /// partial failure.
    async fn apply_payout(
        &self,
        user_id: UserId,
        balance: Decimal,
        paid_at: DateTime<Utc>,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError>;
    async fn update_interest_rate(&self, user_id: UserId, rate: Decimal)
        -> Result<(), StoreError>;

    // Transaction log.
    /// Append an IN_PROGRESS intent entry. Deliberately pool-direct (no
    /// scope): the audit record must survive a later rollback.
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError>;
    /// Transition an entry to a terminal status. `scope: None` is the
    /// best-effort fixup path used after a scope has already rolled back.
    /// Never overwrites a status that is already terminal.
    async fn finalize_entry(
        &self,
        id: EntryId,
        status: EntryStatus,
        scope: Option<&mut Self::Scope>,
    ) -> Result<(), StoreError>;
    async fn find_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError>;
}
