//! The ledger transaction engine.
//!
//! Every money movement follows the same three-phase protocol:
//!
//! 1. append an IN_PROGRESS intent entry to the transaction log (outside
//!    any scope, so the audit record survives rollback),
//! 2. mutate the balance inside a transactional scope,
//! 3. finalize the entry COMPLETED inside the same scope and commit.
//!
//! Any failure after phase 1 rolls the scope back and finalizes the entry
//! FAILED through the unscoped best-effort path. The result is exactly one
//! terminal-status entry per attempt, whatever the outcome.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use bankd_auth::User;
use bankd_core::{BankError, BankResult, EntryId};
use bankd_ledger::{accrued_interest, Account, EntryAction, EntryStatus, LedgerEntry};
use bankd_store::{Isolation, LedgerStore, Page};

/// Upper bound on a single deposit/withdrawal.
pub const MAX_MOVEMENT_AMOUNT: Decimal = dec!(1_000_000_000_000);

const PAYOUT_PAGE_SIZE: u32 = 200;

/// Outcome of one interest-payout batch pass.
#[derive(Debug, Default, Clone)]
pub struct PayoutRun {
    /// Account snapshots after the pass (paid accounts carry the new
    /// balance, failed ones their previous state).
    pub accounts: Vec<Account>,
    pub considered: usize,
    pub paid: usize,
}

enum PayoutFailure {
    /// This account's payout failed; the batch continues.
    Isolated(BankError),
    /// The store itself is unhealthy; the batch aborts.
    Fatal(BankError),
}

enum Direction {
    Deposit,
    Withdrawal,
}

/// Orchestrator for all ledger mutations.
pub struct LedgerEngine<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Withdraw `amount` from the account owned by `username`.
    #[instrument(skip(self), err)]
    pub async fn withdraw(&self, username: &str, amount: Decimal) -> BankResult<()> {
        self.move_funds(username, amount, Direction::Withdrawal)
            .await
    }

    /// Deposit `amount` into the account owned by `username`.
    #[instrument(skip(self), err)]
    pub async fn deposit(&self, username: &str, amount: Decimal) -> BankResult<()> {
        self.move_funds(username, amount, Direction::Deposit).await
    }

    /// Current account snapshot for `username`. Pure read, no scope.
    pub async fn account_balance(&self, username: &str) -> BankResult<Account> {
        let user = self.resolve_user(username).await?;
        self.resolve_account(&user).await
    }

    /// Set the annualized interest rate for `username`'s account.
    ///
    /// Rate changes are not money movements; no ledger entry is created.
    #[instrument(skip(self), err)]
    pub async fn update_interest_rate(&self, username: &str, rate: Decimal) -> BankResult<()> {
        bankd_ledger::account::validate_rate(rate)?;
        let user = self.resolve_user(username).await?;
        // Resolve first so a missing account surfaces as NotFound rather
        // than a silent zero-row update.
        let account = self.resolve_account(&user).await?;
        self.store
            .update_interest_rate(account.user_id, rate)
            .await?;
        Ok(())
    }

    /// One interest-payout pass over the full account population.
    ///
    /// Accounts are visited page by page; each account gets its own
    /// serializable scope and its own intent entry, and one account's
    /// failure never aborts the batch. A cancel signal is honored between
    /// accounts; the in-flight account is rolled back, everything already
    /// committed stays committed.
    #[instrument(skip_all, fields(considered, paid))]
    pub async fn interest_payout(
        &self,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> BankResult<PayoutRun> {
        let mut run = PayoutRun::default();
        let mut page = Page::new(0, PAYOUT_PAGE_SIZE);

        loop {
            let accounts = self.store.list_accounts(page).await?;
            if accounts.is_empty() {
                break;
            }
            let page_len = accounts.len();

            for account in accounts {
                if cancel.is_some_and(|rx| *rx.borrow()) {
                    info!(
                        considered = run.considered,
                        paid = run.paid,
                        "interest payout cancelled mid-batch"
                    );
                    return Ok(run);
                }

                run.considered += 1;
                match self.payout_account(&account).await {
                    Ok(updated) => {
                        run.paid += 1;
                        run.accounts.push(updated);
                    }
                    Err(PayoutFailure::Isolated(err)) => {
                        warn!(
                            user_id = %account.user_id,
                            error = %err,
                            "interest payout failed for account; continuing"
                        );
                        run.accounts.push(account);
                    }
                    Err(PayoutFailure::Fatal(err)) => return Err(err),
                }
            }

            if page_len < PAYOUT_PAGE_SIZE as usize {
                break;
            }
            page = page.next();
        }

        tracing::Span::current().record("considered", run.considered);
        tracing::Span::current().record("paid", run.paid);
        Ok(run)
    }

    /// Pay accrued interest into one account under a serializable scope.
    ///
    /// The page listing is a stale snapshot; the balance the interest is
    /// computed from is re-read inside the scope so a deposit landing
    /// mid-batch conflicts instead of being silently overwritten.
    async fn payout_account(&self, account: &Account) -> Result<Account, PayoutFailure> {
        let mut scope = self
            .store
            .begin(Isolation::Serializable)
            .await
            .map_err(|e| PayoutFailure::Fatal(e.into()))?;

        let current = match self
            .store
            .find_account_by_user_in(account.user_id, &mut scope)
            .await
        {
            Ok(Some(current)) => current,
            Ok(None) => {
                self.rollback_quietly(scope).await;
                return Err(PayoutFailure::Isolated(BankError::not_found(format!(
                    "account for user {}",
                    account.user_id
                ))));
            }
            Err(err) => {
                self.rollback_quietly(scope).await;
                return Err(PayoutFailure::Isolated(err.into()));
            }
        };

        let now = Utc::now();
        let elapsed = now - current.accrual_start();
        let interest = accrued_interest(current.balance, current.interest_rate, elapsed);
        let new_balance = current.balance + interest;

        let entry = LedgerEntry::credit(interest, EntryAction::Interest);
        if let Err(err) = self.store.append_entry(&entry).await {
            self.rollback_quietly(scope).await;
            return Err(PayoutFailure::Fatal(err.into()));
        }

        let staged = async {
            self.store
                .apply_payout(current.user_id, new_balance, now, &mut scope)
                .await?;
            self.store
                .finalize_entry(entry.id, EntryStatus::Completed, Some(&mut scope))
                .await
        };

        if let Err(err) = staged.await {
            self.rollback_quietly(scope).await;
            self.mark_entry_failed(entry.id).await;
            return Err(PayoutFailure::Isolated(err.into()));
        }

        if let Err(err) = self.store.commit(scope).await {
            self.mark_entry_failed(entry.id).await;
            return Err(PayoutFailure::Isolated(err.into()));
        }

        let mut updated = current;
        updated.balance = new_balance;
        updated.last_interest_payout = Some(now);
        Ok(updated)
    }

    async fn move_funds(
        &self,
        username: &str,
        amount: Decimal,
        direction: Direction,
    ) -> BankResult<()> {
        validate_amount(amount)?;
        let user = self.resolve_user(username).await?;

        let entry = match direction {
            Direction::Withdrawal => LedgerEntry::debit(amount, EntryAction::Withdrawal),
            Direction::Deposit => LedgerEntry::credit(amount, EntryAction::Deposit),
        };
        self.store.append_entry(&entry).await?;

        let mut scope = match self.store.begin(Isolation::ReadCommitted).await {
            Ok(scope) => scope,
            Err(err) => {
                self.mark_entry_failed(entry.id).await;
                return Err(err.into());
            }
        };

        let staged = self
            .stage_movement(&user, &entry, amount, &direction, &mut scope)
            .await;

        match staged {
            Ok(new_balance) => match self.store.commit(scope).await {
                Ok(()) => {
                    info!(
                        username,
                        entry_id = %entry.id,
                        %new_balance,
                        "movement committed"
                    );
                    Ok(())
                }
                Err(err) => {
                    self.mark_entry_failed(entry.id).await;
                    Err(err.into())
                }
            },
            Err(err) => {
                self.rollback_quietly(scope).await;
                self.mark_entry_failed(entry.id).await;
                Err(err)
            }
        }
    }

    /// Stage the balance mutation and the COMPLETED finalization in `scope`.
    /// Returns the new balance on success; nothing is durable until commit.
    async fn stage_movement(
        &self,
        user: &User,
        entry: &LedgerEntry,
        amount: Decimal,
        direction: &Direction,
        scope: &mut S::Scope,
    ) -> BankResult<Decimal> {
        // Scoped read: the new balance must be computed under the scope's
        // isolation, not from a pool-direct snapshot.
        let account = self
            .store
            .find_account_by_user_in(user.id, scope)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for {}", user.username)))?;

        let new_balance = match direction {
            Direction::Withdrawal => {
                if amount > account.balance {
                    return Err(BankError::InsufficientBalance);
                }
                account.balance - amount
            }
            Direction::Deposit => account.balance + amount,
        };

        self.store
            .update_balance(user.id, new_balance, scope)
            .await?;
        self.store
            .finalize_entry(entry.id, EntryStatus::Completed, Some(scope))
            .await?;
        Ok(new_balance)
    }

    async fn resolve_user(&self, username: &str) -> BankResult<User> {
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| BankError::not_found(format!("user {username}")))
    }

    async fn resolve_account(&self, user: &User) -> BankResult<Account> {
        self.store
            .find_account_by_user(user.id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for {}", user.username)))
    }

    /// Best-effort FAILED finalization outside any scope.
    ///
    /// Runs after the original scope is gone (rolled back or failed to
    /// commit), so there is nothing transactional left to attach to. Its
    /// own failure is logged and swallowed.
    async fn mark_entry_failed(&self, entry_id: EntryId) {
        if let Err(err) = self
            .store
            .finalize_entry(entry_id, EntryStatus::Failed, None)
            .await
        {
            warn!(%entry_id, error = %err, "could not mark entry FAILED");
        }
    }

    async fn rollback_quietly(&self, scope: S::Scope) {
        if let Err(err) = self.store.rollback(scope).await {
            warn!(error = %err, "rollback failed");
        }
    }
}

/// Positive and within the service-wide movement cap.
fn validate_amount(amount: Decimal) -> BankResult<()> {
    if amount <= Decimal::ZERO {
        return Err(BankError::unprocessable("amount must be positive"));
    }
    if amount > MAX_MOVEMENT_AMOUNT {
        return Err(BankError::unprocessable(format!(
            "amount exceeds maximum of {MAX_MOVEMENT_AMOUNT}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankd_auth::{Credential, Role};
    use bankd_ledger::EntryType;
    use bankd_store::MemoryLedgerStore;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        engine: LedgerEngine<MemoryLedgerStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryLedgerStore::new());
            let engine = LedgerEngine::new(store.clone());
            Self { store, engine }
        }

        /// Seed a customer with an account in the given state.
        async fn seed(&self, username: &str, account_fn: impl FnOnce(&mut Account)) -> Account {
            let user = User::new(username, "Test User", Role::Customer);
            let credential = Credential::new(user.id, "pw");
            let mut account = Account::open(user.id, dec!(0.10), Utc::now()).unwrap();
            account_fn(&mut account);

            let mut scope = self.store.begin(Isolation::ReadCommitted).await.unwrap();
            self.store
                .create_user(&user, &credential, &mut scope)
                .await
                .unwrap();
            self.store.create_account(&account, &mut scope).await.unwrap();
            self.store.commit(scope).await.unwrap();
            account
        }

        async fn balance_of(&self, username: &str) -> Decimal {
            self.engine.account_balance(username).await.unwrap().balance
        }
    }

    #[tokio::test]
    async fn deposit_updates_balance_with_one_completed_credit_entry() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.balance = dec!(300.00)).await;

        fx.engine.deposit("alice", dec!(200.00)).await.unwrap();

        assert_eq!(fx.balance_of("alice").await, dec!(500.00));
        let entries = fx.store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Credit);
        assert_eq!(entries[0].action, EntryAction::Deposit);
        assert_eq!(entries[0].status, EntryStatus::Completed);
        assert_eq!(entries[0].amount, dec!(200.00));
    }

    #[tokio::test]
    async fn over_withdrawal_is_rejected_and_never_completes() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.balance = dec!(300.00)).await;

        let err = fx.engine.withdraw("alice", dec!(500.00)).await.unwrap_err();
        assert_eq!(err, BankError::InsufficientBalance);

        assert_eq!(fx.balance_of("alice").await, dec!(300.00));
        let entries = fx.store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Failed);
        assert_eq!(entries[0].entry_type, EntryType::Debit);
    }

    #[tokio::test]
    async fn deposit_then_withdrawal_round_trips_the_balance() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.balance = dec!(1234.56)).await;

        fx.engine.deposit("alice", dec!(41.44)).await.unwrap();
        fx.engine.withdraw("alice", dec!(41.44)).await.unwrap();

        assert_eq!(fx.balance_of("alice").await, dec!(1234.56));
        assert!(fx
            .store
            .entries()
            .iter()
            .all(|e| e.status == EntryStatus::Completed));
    }

    #[tokio::test]
    async fn movement_against_unknown_user_is_not_found() {
        let fx = Fixture::new();
        let err = fx.engine.deposit("nobody", dec!(1.00)).await.unwrap_err();
        assert!(matches!(err, BankError::NotFound(_)));
        // No user resolution, no intent entry.
        assert!(fx.store.entries().is_empty());
    }

    #[tokio::test]
    async fn non_positive_and_oversized_amounts_are_unprocessable() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.balance = dec!(300.00)).await;

        for amount in [dec!(0), dec!(-5.00), MAX_MOVEMENT_AMOUNT + dec!(0.01)] {
            let err = fx.engine.deposit("alice", amount).await.unwrap_err();
            assert!(matches!(err, BankError::Unprocessable(_)), "{amount}");
        }
        assert!(fx.store.entries().is_empty());
    }

    #[tokio::test]
    async fn failed_balance_write_marks_entry_failed_and_keeps_balance() {
        let fx = Fixture::new();
        let account = fx.seed("alice", |a| a.balance = dec!(300.00)).await;
        fx.store.fail_writes_for(account.user_id);

        let err = fx.engine.deposit("alice", dec!(50.00)).await.unwrap_err();
        assert!(matches!(err, BankError::Store(_)));

        fx.store.heal_writes_for(account.user_id);
        assert_eq!(fx.balance_of("alice").await, dec!(300.00));
        let entries = fx.store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Failed);
    }

    #[tokio::test]
    async fn payout_pays_a_full_year_of_interest() {
        let fx = Fixture::new();
        fx.seed("alice", |a| {
            a.balance = dec!(1000.00);
            a.interest_rate = dec!(0.10);
            a.last_interest_payout = Some(Utc::now() - Duration::days(365));
        })
        .await;

        let run = fx.engine.interest_payout(None).await.unwrap();
        assert_eq!(run.considered, 1);
        assert_eq!(run.paid, 1);
        assert_eq!(run.accounts[0].balance, dec!(1100.00));

        let account = fx.engine.account_balance("alice").await.unwrap();
        assert_eq!(account.balance, dec!(1100.00));
        let paid_at = account.last_interest_payout.unwrap();
        assert!(Utc::now() - paid_at < Duration::seconds(5));

        let entries = fx.store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, EntryAction::Interest);
        assert_eq!(entries[0].entry_type, EntryType::Credit);
        assert_eq!(entries[0].status, EntryStatus::Completed);
        assert_eq!(entries[0].amount, dec!(100.00));
    }

    #[tokio::test]
    async fn payout_includes_a_deposit_committed_after_the_page_listing() {
        let fx = Fixture::new();
        let account = fx
            .seed("alice", |a| {
                a.balance = dec!(1000.00);
                a.interest_rate = dec!(0.10);
                a.last_interest_payout = Some(Utc::now() - Duration::days(365));
            })
            .await;

        // The batch holds this snapshot from its page listing.
        let stale = account.clone();

        // A deposit lands before the account's payout scope opens.
        fx.engine.deposit("alice", dec!(500.00)).await.unwrap();

        // Interest must be computed from the in-scope balance (1500.00),
        // not the stale snapshot; the deposit is never erased.
        let updated = fx
            .engine
            .payout_account(&stale)
            .await
            .map_err(|_| "payout failed")
            .unwrap();
        assert_eq!(updated.balance, dec!(1650.00));
        assert_eq!(fx.balance_of("alice").await, dec!(1650.00));
    }

    #[tokio::test]
    async fn payout_accrues_from_creation_when_never_paid() {
        let fx = Fixture::new();
        fx.seed("alice", |a| {
            a.balance = dec!(1000.00);
            a.interest_rate = dec!(0.10);
            a.created_at = Utc::now() - Duration::days(365);
            a.last_interest_payout = None;
        })
        .await;

        let run = fx.engine.interest_payout(None).await.unwrap();
        assert_eq!(run.paid, 1);
        assert_eq!(fx.balance_of("alice").await, dec!(1100.00));
    }

    #[tokio::test]
    async fn payout_isolates_per_account_failures() {
        let fx = Fixture::new();
        let year_ago = Utc::now() - Duration::days(365);
        fx.seed("alice", |a| {
            a.balance = dec!(100.00);
            a.last_interest_payout = Some(year_ago);
        })
        .await;
        let bob = fx
            .seed("bob", |a| {
                a.balance = dec!(100.00);
                a.last_interest_payout = Some(year_ago);
            })
            .await;
        fx.seed("carol", |a| {
            a.balance = dec!(100.00);
            a.last_interest_payout = Some(year_ago);
        })
        .await;

        fx.store.fail_writes_for(bob.user_id);
        let run = fx.engine.interest_payout(None).await.unwrap();

        assert_eq!(run.considered, 3);
        assert_eq!(run.paid, 2);

        fx.store.heal_writes_for(bob.user_id);
        assert_eq!(fx.balance_of("alice").await, dec!(110.00));
        assert_eq!(fx.balance_of("bob").await, dec!(100.00));
        assert_eq!(fx.balance_of("carol").await, dec!(110.00));

        // Bob's accrual interval did not advance, so the next run retries him.
        let bob_now = fx.engine.account_balance("bob").await.unwrap();
        assert_eq!(bob_now.last_interest_payout, Some(year_ago));

        let statuses: Vec<_> = fx.store.entries().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                EntryStatus::Completed,
                EntryStatus::Failed,
                EntryStatus::Completed
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_payout_stops_before_the_next_account() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.balance = dec!(100.00)).await;
        fx.seed("bob", |a| a.balance = dec!(100.00)).await;

        let (tx, rx) = watch::channel(true);
        let run = fx.engine.interest_payout(Some(&rx)).await.unwrap();
        drop(tx);

        assert_eq!(run.considered, 0);
        assert_eq!(run.paid, 0);
        assert!(fx.store.entries().is_empty());
    }

    #[tokio::test]
    async fn update_interest_rate_binds_rate_and_owner_independently() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.interest_rate = dec!(0.10)).await;
        fx.seed("bob", |a| a.interest_rate = dec!(0.20)).await;

        fx.engine
            .update_interest_rate("alice", dec!(0.35))
            .await
            .unwrap();

        let alice = fx.engine.account_balance("alice").await.unwrap();
        let bob = fx.engine.account_balance("bob").await.unwrap();
        assert_eq!(alice.interest_rate, dec!(0.35));
        assert_eq!(bob.interest_rate, dec!(0.20));
        // Rate changes create no ledger entries.
        assert!(fx.store.entries().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_rate_is_rejected_before_any_write() {
        let fx = Fixture::new();
        fx.seed("alice", |a| a.interest_rate = dec!(0.10)).await;

        let err = fx
            .engine
            .update_interest_rate("alice", dec!(1.01))
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::Unprocessable(_)));

        let alice = fx.engine.account_balance("alice").await.unwrap();
        assert_eq!(alice.interest_rate, dec!(0.10));
    }
}
