//! Postgres-backed ledger store.
//!
//! All money fields go through the configured [`FieldCodec`]; the balance
//! and rate columns hold encoded text, the transaction-log amount column is
//! NUMERIC. Scopes are real database transactions; serializable isolation
//! is requested per scope with `SET TRANSACTION`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use bankd_auth::{Credential, Role, User};
use bankd_core::{EntryId, UserId};
use bankd_ledger::{Account, EntryAction, EntryStatus, EntryType, LedgerEntry};

use crate::codec::{FieldCodec, PlainCodec};
use crate::error::{map_sqlx_error, StoreError};
use crate::{Isolation, LedgerStore, Page};

/// Embedded schema migrations; run at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL implementation of [`LedgerStore`].
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    codec: Arc<dyn FieldCodec>,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_codec(pool, Arc::new(PlainCodec))
    }

    /// Use a custom codec (e.g. field-level encryption at rest).
    pub fn with_codec(pool: PgPool, codec: Arc<dyn FieldCodec>) -> Self {
        Self { pool, codec }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::database("migrate", e.to_string()))
    }

    fn account_from_row(&self, row: &sqlx::postgres::PgRow) -> Result<Account, StoreError> {
        let balance_raw: String = try_column(row, "balance")?;
        let rate_raw: String = try_column(row, "interest_rate")?;
        Ok(Account {
            id: bankd_core::AccountId::from_uuid(try_column(row, "id")?),
            user_id: UserId::from_uuid(try_column(row, "user_id")?),
            account_number: try_column(row, "account_number")?,
            balance: self.codec.decode(&balance_raw)?,
            interest_rate: self.codec.decode(&rate_raw)?,
            created_at: try_column(row, "created_at")?,
            last_interest_payout: try_column(row, "last_interest_payout")?,
        })
    }
}

fn try_column<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::database("decode_row", format!("{name}: {e}")))
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::database("decode_row", format!("unknown role: {raw}")))
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    let type_raw: String = try_column(row, "type")?;
    let action_raw: String = try_column(row, "action")?;
    let status_raw: String = try_column(row, "status")?;
    Ok(LedgerEntry {
        id: EntryId::from_uuid(try_column(row, "id")?),
        entry_type: EntryType::from_db_code(&type_raw)
            .map_err(|e| StoreError::database("decode_row", e.to_string()))?,
        amount: try_column(row, "amount")?,
        action: EntryAction::from_str_db(&action_raw)
            .map_err(|e| StoreError::database("decode_row", e.to_string()))?,
        status: EntryStatus::from_str_db(&status_raw)
            .map_err(|e| StoreError::database("decode_row", e.to_string()))?,
        created_at: try_column(row, "created_at")?,
        updated_at: try_column(row, "updated_at")?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Scope = Transaction<'static, Postgres>;

    async fn begin(&self, isolation: Isolation) -> Result<Self::Scope, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        if isolation == Isolation::Serializable {
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("set_isolation", e))?;
        }

        Ok(tx)
    }

    async fn commit(&self, scope: Self::Scope) -> Result<(), StoreError> {
        scope.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(&self, scope: Self::Scope) -> Result<(), StoreError> {
        scope
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        let n: i64 = try_column(&row, "n")?;
        Ok(n as u64)
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, fullname, role
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_username", e))?;

        match row {
            Some(row) => {
                let role_raw: String = try_column(&row, "role")?;
                Ok(Some(User {
                    id: UserId::from_uuid(try_column(&row, "id")?),
                    username: try_column(&row, "username")?,
                    fullname: try_column(&row, "fullname")?,
                    role: parse_role(&role_raw)?,
                }))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn find_credential(&self, user_id: UserId) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, password_digest
            FROM credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_credential", e))?;

        match row {
            Some(row) => Ok(Some(Credential {
                id: try_column(&row, "id")?,
                user_id: UserId::from_uuid(try_column(&row, "user_id")?),
                password_digest: try_column(&row, "password_digest")?,
            })),
            None => Ok(None),
        }
    }

    async fn create_user(
        &self,
        user: &User,
        credential: &Credential,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, fullname, role)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.fullname)
        .bind(user.role.as_str())
        .execute(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO credentials (id, user_id, password_digest)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(credential.id)
        .bind(credential.user_id.as_uuid())
        .bind(&credential.password_digest)
        .execute(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("create_credential", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn update_user_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET role = $1
            WHERE username = $2
            "#,
        )
        .bind(role.as_str())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user_role", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn find_account_by_user(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, account_number, balance, interest_rate,
                   created_at, last_interest_payout
            FROM accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_account_by_user", e))?;

        match row {
            Some(row) => Ok(Some(self.account_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_account_by_user_in(
        &self,
        user_id: UserId,
        scope: &mut Self::Scope,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, account_number, balance, interest_rate,
                   created_at, last_interest_payout
            FROM accounts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("find_account_by_user_in", e))?;

        match row {
            Some(row) => Ok(Some(self.account_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_account(
        &self,
        account: &Account,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, user_id, account_number, balance, interest_rate, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.user_id.as_uuid())
        .bind(&account.account_number)
        .bind(self.codec.encode(account.balance)?)
        .bind(self.codec.encode(account.interest_rate)?)
        .bind(account.created_at)
        .execute(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("create_account", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, account_number, balance, interest_rate,
                   created_at, last_interest_payout
            FROM accounts
            ORDER BY created_at, id
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(page.offset as i64)
        .bind(page.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(self.account_from_row(&row)?);
        }
        Ok(accounts)
    }

    async fn update_balance(
        &self,
        user_id: UserId,
        balance: Decimal,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1
            WHERE user_id = $2
            "#,
        )
        .bind(self.codec.encode(balance)?)
        .bind(user_id.as_uuid())
        .execute(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("update_balance", e))?;
        Ok(())
    }

    async fn apply_payout(
        &self,
        user_id: UserId,
        balance: Decimal,
        paid_at: DateTime<Utc>,
        scope: &mut Self::Scope,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1, last_interest_payout = $2
            WHERE user_id = $3
            "#,
        )
        .bind(self.codec.encode(balance)?)
        .bind(paid_at)
        .bind(user_id.as_uuid())
        .execute(&mut **scope)
        .await
        .map_err(|e| map_sqlx_error("apply_payout", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn update_interest_rate(
        &self,
        user_id: UserId,
        rate: Decimal,
    ) -> Result<(), StoreError> {
        // SET and WHERE parameters are bound independently.
        sqlx::query(
            r#"
            UPDATE accounts
            SET interest_rate = $1
            WHERE user_id = $2
            "#,
        )
        .bind(self.codec.encode(rate)?)
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_interest_rate", e))?;
        Ok(())
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id), err)]
    async fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, type, amount, action, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.entry_type.db_code())
        .bind(entry.amount)
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;
        Ok(())
    }

    async fn finalize_entry(
        &self,
        id: EntryId,
        status: EntryStatus,
        scope: Option<&mut Self::Scope>,
    ) -> Result<(), StoreError> {
        // The status guard makes terminal statuses immutable at the store
        // level, whichever path the update takes.
        let query = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid());

        let result = match scope {
            Some(tx) => query.execute(&mut **tx).await,
            None => query.execute(&self.pool).await,
        }
        .map_err(|e| map_sqlx_error("finalize_entry", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFinalizable);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn find_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, type, amount, action, status, created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_entry", e))?;

        match row {
            Some(row) => Ok(Some(entry_from_row(&row)?)),
            None => Ok(None),
        }
    }
}
