//! User provisioning and credential verification.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use bankd_auth::{verify_password, Credential, Principal, Role, User};
use bankd_core::{BankError, BankResult};
use bankd_ledger::Account;
use bankd_store::{Isolation, LedgerStore};

/// Everything the API needs to render a user.
#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: User,
    pub account: Account,
}

/// Provisioning and lookup of users and their accounts.
///
/// Every user owns exactly one account, created in the same scope as the
/// user row so a provisioning failure leaves no half-registered customer.
pub struct UserService<S: LedgerStore> {
    store: Arc<S>,
    default_interest_rate: Decimal,
}

impl<S: LedgerStore> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            default_interest_rate: self.default_interest_rate,
        }
    }
}

impl<S: LedgerStore> UserService<S> {
    pub fn new(store: Arc<S>, default_interest_rate: Decimal) -> Self {
        Self {
            store,
            default_interest_rate,
        }
    }

    /// Create a user, their credential, and their zero-balance account.
    #[instrument(skip(self, password), err)]
    pub async fn create_user(
        &self,
        username: &str,
        fullname: &str,
        password: &str,
        role: Role,
    ) -> BankResult<UserDetail> {
        if self
            .store
            .find_user_by_username(username)
            .await?
            .is_some()
        {
            return Err(BankError::conflict(format!("username taken: {username}")));
        }

        let user = User::new(username, fullname, role);
        let credential = Credential::new(user.id, password);
        let account = Account::open(user.id, self.default_interest_rate, Utc::now())?;

        let mut scope = self.store.begin(Isolation::ReadCommitted).await?;
        let staged = async {
            self.store.create_user(&user, &credential, &mut scope).await?;
            self.store.create_account(&account, &mut scope).await
        };
        if let Err(err) = staged.await {
            if let Err(rb) = self.store.rollback(scope).await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            return Err(err.into());
        }
        self.store.commit(scope).await?;

        info!(username, role = role.as_str(), "user provisioned");
        Ok(UserDetail { user, account })
    }

    /// First-run provisioning of the initial super admin.
    ///
    /// Refused as soon as any user exists, so the unauthenticated
    /// bootstrap route cannot be replayed against a live service.
    #[instrument(skip(self, password), err)]
    pub async fn bootstrap_super_admin(
        &self,
        username: &str,
        fullname: &str,
        password: &str,
    ) -> BankResult<UserDetail> {
        if self.store.count_users().await? > 0 {
            return Err(BankError::conflict("service is already bootstrapped"));
        }
        self.create_user(username, fullname, password, Role::SuperAdmin)
            .await
    }

    pub async fn user_detail(&self, username: &str) -> BankResult<UserDetail> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| BankError::not_found(format!("user {username}")))?;
        let account = self
            .store
            .find_account_by_user(user.id)
            .await?
            .ok_or_else(|| BankError::not_found(format!("account for {username}")))?;
        Ok(UserDetail { user, account })
    }

    #[instrument(skip(self), err)]
    pub async fn update_role(&self, username: &str, role: Role) -> BankResult<()> {
        // Surface a missing user as NotFound instead of a zero-row update.
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| BankError::not_found(format!("user {username}")))?;
        self.store.update_user_role(username, role).await?;
        Ok(())
    }

    /// Check a username/password pair. Failures are deliberately uniform:
    /// an unknown user and a wrong password both come back `Unauthorized`.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> BankResult<Principal> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(BankError::Unauthorized)?;
        let credential = self
            .store
            .find_credential(user.id)
            .await?
            .ok_or(BankError::Unauthorized)?;
        if !verify_password(password, &credential.password_digest) {
            return Err(BankError::Unauthorized);
        }
        Ok(Principal::new(user.id, user.username, user.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankd_store::MemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn service() -> UserService<MemoryLedgerStore> {
        UserService::new(Arc::new(MemoryLedgerStore::new()), dec!(0.05))
    }

    #[tokio::test]
    async fn create_user_provisions_account_with_default_rate() {
        let svc = service();
        let detail = svc
            .create_user("alice", "Alice Doe", "hunter2", Role::Customer)
            .await
            .unwrap();

        assert_eq!(detail.user.username, "alice");
        assert_eq!(detail.account.balance, Decimal::ZERO);
        assert_eq!(detail.account.interest_rate, dec!(0.05));

        let fetched = svc.user_detail("alice").await.unwrap();
        assert_eq!(fetched.user.id, detail.user.id);
        assert_eq!(fetched.account.id, detail.account.id);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let svc = service();
        svc.create_user("alice", "Alice Doe", "pw", Role::Customer)
            .await
            .unwrap();
        let err = svc
            .create_user("alice", "Other Alice", "pw2", Role::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::Conflict(_)));
    }

    #[tokio::test]
    async fn verify_credentials_is_uniform_on_failure() {
        let svc = service();
        svc.create_user("alice", "Alice Doe", "hunter2", Role::Customer)
            .await
            .unwrap();

        let principal = svc.verify_credentials("alice", "hunter2").await.unwrap();
        assert_eq!(principal.username(), "alice");
        assert_eq!(principal.role(), Role::Customer);

        let wrong_pw = svc.verify_credentials("alice", "nope").await.unwrap_err();
        let no_user = svc.verify_credentials("bob", "hunter2").await.unwrap_err();
        assert_eq!(wrong_pw, BankError::Unauthorized);
        assert_eq!(no_user, BankError::Unauthorized);
    }

    #[tokio::test]
    async fn bootstrap_only_works_on_an_empty_service() {
        let svc = service();
        let detail = svc
            .bootstrap_super_admin("root", "Root Admin", "pw")
            .await
            .unwrap();
        assert_eq!(detail.user.role, Role::SuperAdmin);

        let err = svc
            .bootstrap_super_admin("root2", "Another Admin", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_role_promotes_an_existing_user() {
        let svc = service();
        svc.create_user("alice", "Alice Doe", "pw", Role::Customer)
            .await
            .unwrap();

        svc.update_role("alice", Role::Admin).await.unwrap();
        let detail = svc.user_detail("alice").await.unwrap();
        assert_eq!(detail.user.role, Role::Admin);

        let err = svc.update_role("ghost", Role::Admin).await.unwrap_err();
        assert!(matches!(err, BankError::NotFound(_)));
    }
}
