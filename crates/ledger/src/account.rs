//! Bank account record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use bankd_core::{AccountId, BankError, BankResult, UserId};

/// A customer account.
///
/// Invariants at rest: `balance >= 0` and `interest_rate` in `[0, 1]`.
/// Mutated only through the store inside a transactional scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    /// Display identifier shown to customers; not the primary key.
    pub account_number: String,
    pub balance: Decimal,
    /// Annualized interest rate as a fraction (0.10 = 10% p.a.).
    pub interest_rate: Decimal,
    pub created_at: DateTime<Utc>,
    /// Unset until the first payout; accrual then starts from `created_at`.
    pub last_interest_payout: Option<DateTime<Utc>>,
}

impl Account {
    /// Open a fresh account with zero balance.
    pub fn open(user_id: UserId, interest_rate: Decimal, now: DateTime<Utc>) -> BankResult<Self> {
        validate_rate(interest_rate)?;
        let id = AccountId::new();
        Ok(Self {
            id,
            user_id,
            account_number: derive_account_number(id),
            balance: Decimal::ZERO,
            interest_rate,
            created_at: now,
            last_interest_payout: None,
        })
    }

    /// Start of the current accrual period.
    pub fn accrual_start(&self) -> DateTime<Utc> {
        self.last_interest_payout.unwrap_or(self.created_at)
    }
}

/// Check that a rate is a fraction in `[0, 1]`.
pub fn validate_rate(rate: Decimal) -> BankResult<()> {
    if rate < Decimal::ZERO || rate > dec!(1) {
        return Err(BankError::unprocessable(format!(
            "interest rate must be within [0, 1], got {rate}"
        )));
    }
    Ok(())
}

/// Derive the 36-digit display number from the account id.
fn derive_account_number(id: AccountId) -> String {
    let n = id.as_uuid().as_u128() % 10u128.pow(36);
    format!("{n:036}")
}
