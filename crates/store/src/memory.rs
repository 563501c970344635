//! In-memory ledger store.
//!
//! Scopes stage their writes and apply them atomically on commit, with an
//! optimistic version check per account standing in for the database's
//! isolation: a scope that staged a write against an account whose version
//! moved before commit fails with `Conflict`, the same category a
//! serialization failure maps to on Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bankd_auth::{Credential, Role, User};
use bankd_core::{EntryId, UserId};
use bankd_ledger::{Account, EntryStatus, LedgerEntry};

use crate::error::StoreError;
use crate::{Isolation, LedgerStore, Page};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    credentials: HashMap<UserId, Credential>,
    accounts: HashMap<UserId, Account>,
    account_order: Vec<UserId>,
    account_versions: HashMap<UserId, u64>,
    entries: HashMap<EntryId, LedgerEntry>,
}

enum StagedWrite {
    CreateUser(User, Credential),
    CreateAccount(Account),
    Balance {
        user_id: UserId,
        balance: Decimal,
        seen_version: u64,
    },
    Payout {
        user_id: UserId,
        balance: Decimal,
        paid_at: DateTime<Utc>,
        seen_version: u64,
    },
    EntryStatus {
        id: EntryId,
        status: EntryStatus,
    },
}

/// Staged unit of work against a [`MemoryLedgerStore`].
pub struct MemoryScope {
    #[allow(dead_code)]
    isolation: Isolation,
    staged: Vec<StagedWrite>,
    /// Account versions as of this scope's reads; stale at commit means
    /// a concurrent writer got there first.
    read_versions: HashMap<UserId, u64>,
}

/// In-memory implementation of [`LedgerStore`] for tests and local runs.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
    failing_accounts: Mutex<HashSet<UserId>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a write failure for this user's account: subsequent balance
    /// and payout writes fail as database errors. Test support.
    pub fn fail_writes_for(&self, user_id: UserId) {
        self.failing_accounts.lock().unwrap().insert(user_id);
    }

    /// Clear an injected failure.
    pub fn heal_writes_for(&self, user_id: UserId) {
        self.failing_accounts.lock().unwrap().remove(&user_id);
    }

    /// Snapshot of every transaction-log entry, oldest first. Test support.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        let state = self.state.lock().unwrap();
        let mut entries: Vec<_> = state.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    fn check_injected_failure(&self, user_id: UserId, operation: &str) -> Result<(), StoreError> {
        if self.failing_accounts.lock().unwrap().contains(&user_id) {
            return Err(StoreError::database(operation, "injected write failure"));
        }
        Ok(())
    }

    fn account_version(&self, user_id: UserId) -> u64 {
        self.state
            .lock()
            .unwrap()
            .account_versions
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }
}

impl State {
    fn validate(&self, write: &StagedWrite) -> Result<(), StoreError> {
        match write {
            StagedWrite::CreateUser(user, _) => {
                if self.usernames.contains_key(&user.username) {
                    return Err(StoreError::Conflict(format!(
                        "username taken: {}",
                        user.username
                    )));
                }
            }
            StagedWrite::CreateAccount(account) => {
                if self.accounts.contains_key(&account.user_id) {
                    return Err(StoreError::Conflict("account exists for user".into()));
                }
            }
            StagedWrite::Balance {
                user_id,
                seen_version,
                ..
            }
            | StagedWrite::Payout {
                user_id,
                seen_version,
                ..
            } => {
                let current = self.account_versions.get(user_id).copied().unwrap_or(0);
                if current != *seen_version {
                    return Err(StoreError::Conflict(
                        "serialization failure: account changed since read".into(),
                    ));
                }
                if !self.accounts.contains_key(user_id) {
                    return Err(StoreError::database("commit", "account missing"));
                }
            }
            StagedWrite::EntryStatus { id, .. } => {
                match self.entries.get(id) {
                    Some(entry) if !entry.status.is_terminal() => {}
                    _ => return Err(StoreError::EntryNotFinalizable),
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: StagedWrite) {
        match write {
            StagedWrite::CreateUser(user, credential) => {
                self.usernames.insert(user.username.clone(), user.id);
                self.credentials.insert(user.id, credential);
                self.users.insert(user.id, user);
            }
            StagedWrite::CreateAccount(account) => {
                self.account_order.push(account.user_id);
                self.account_versions.insert(account.user_id, 0);
                self.accounts.insert(account.user_id, account);
            }
            StagedWrite::Balance {
                user_id, balance, ..
            } => {
                if let Some(account) = self.accounts.get_mut(&user_id) {
                    account.balance = balance;
                }
                *self.account_versions.entry(user_id).or_insert(0) += 1;
            }
            StagedWrite::Payout {
                user_id,
                balance,
                paid_at,
                ..
            } => {
                if let Some(account) = self.accounts.get_mut(&user_id) {
                    account.balance = balance;
                    account.last_interest_payout = Some(paid_at);
                }
                *self.account_versions.entry(user_id).or_insert(0) += 1;
            }
            StagedWrite::EntryStatus { id, status } => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.status = status;
                    entry.updated_at = Utc::now();
                }
            }
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Scope = MemoryScope;

    async fn begin(&self, isolation: Isolation) -> Result<Self::Scope, StoreError> {
        Ok(MemoryScope {
            isolation,
            staged: Vec::new(),
            read_versions: HashMap::new(),
        })
    }

    async fn commit(&self, scope: Self::Scope) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        // Validate everything before applying anything: commit is atomic.
        for write in &scope.staged {
            state.validate(write)?;
        }
        for write in scope.staged {
            state.apply(write);
        }
        Ok(())
    }

    async fn rollback(&self, scope: Self::Scope) -> Result<(), StoreError> {
        drop(scope);
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().unwrap().users.len() as u64)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_credential(&self, user_id: UserId) -> Result<Option<Credential>, StoreError> {
        Ok(self.state.lock().unwrap().credentials.get(&user_id).cloned())
    }

    async fn create_user(
        &self,
        user: &User,
        credential: &Credential,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        scope
            .staged
            .push(StagedWrite::CreateUser(user.clone(), credential.clone()));
        Ok(())
    }

    async fn update_user_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let user_id = state
            .usernames
            .get(username)
            .copied()
            .ok_or_else(|| StoreError::database("update_user_role", "no such user"))?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.role = role;
        }
        Ok(())
    }

    async fn find_account_by_user(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().unwrap().accounts.get(&user_id).cloned())
    }

    async fn find_account_by_user_in(
        &self,
        user_id: UserId,
        scope: &mut Self::Scope,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        let account = state.accounts.get(&user_id).cloned();
        if account.is_some() {
            let version = state.account_versions.get(&user_id).copied().unwrap_or(0);
            scope.read_versions.insert(user_id, version);
        }
        Ok(account)
    }

    async fn create_account(
        &self,
        account: &Account,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        scope.staged.push(StagedWrite::CreateAccount(account.clone()));
        Ok(())
    }

    async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .account_order
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|id| state.accounts.get(id))
            .cloned()
            .collect())
    }

    async fn update_balance(
        &self,
        user_id: UserId,
        balance: Decimal,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        self.check_injected_failure(user_id, "update_balance")?;
        let seen_version = scope
            .read_versions
            .get(&user_id)
            .copied()
            .unwrap_or_else(|| self.account_version(user_id));
        scope.staged.push(StagedWrite::Balance {
            user_id,
            balance,
            seen_version,
        });
        Ok(())
    }

    async fn apply_payout(
        &self,
        user_id: UserId,
        balance: Decimal,
        paid_at: DateTime<Utc>,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        self.check_injected_failure(user_id, "apply_payout")?;
        let seen_version = scope
            .read_versions
            .get(&user_id)
            .copied()
            .unwrap_or_else(|| self.account_version(user_id));
        scope.staged.push(StagedWrite::Payout {
            user_id,
            balance,
            paid_at,
            seen_version,
        });
        Ok(())
    }

    async fn update_interest_rate(
        &self,
        user_id: UserId,
        rate: Decimal,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get_mut(&user_id) {
            Some(account) => {
                account.interest_rate = rate;
            }
            None => return Err(StoreError::database("update_interest_rate", "no account")),
        }
        *state.account_versions.entry(user_id).or_insert(0) += 1;
        Ok(())
    }

    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(entry.id, entry.clone());
        Ok(())
    }

    async fn finalize_entry(
        &self,
        id: EntryId,
        status: EntryStatus,
        scope: Option<&mut Self::Scope>,
    ) -> Result<(), StoreError> {
        match scope {
            Some(scope) => {
                scope.staged.push(StagedWrite::EntryStatus { id, status });
                Ok(())
            }
            None => {
                let mut state = self.state.lock().unwrap();
                match state.entries.get_mut(&id) {
                    Some(entry) if !entry.status.is_terminal() => {
                        entry.status = status;
                        entry.updated_at = Utc::now();
                        Ok(())
                    }
                    _ => Err(StoreError::EntryNotFinalizable),
                }
            }
        }
    }

    async fn find_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.state.lock().unwrap().entries.get(&id).cloned())
    }
}
