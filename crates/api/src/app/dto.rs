use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use bankd_engine::{PayoutRun, UserDetail, MAX_MOVEMENT_AMOUNT};
use bankd_ledger::Account;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub username: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct InterestRateRequest {
    pub username: String,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub fullname: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct BootstrapRequest {
    pub username: String,
    pub fullname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

// -------------------------
// Validation
// -------------------------

/// Usernames: 3..=64 word characters. Checked before any store lookup so a
/// malformed name never reaches a query.
pub fn validate_username(username: &str) -> Result<(), axum::response::Response> {
    let ok = (3..=64).contains(&username.len())
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_username",
            "username must be 3-64 characters of [A-Za-z0-9_]",
        ))
    }
}

/// Amounts: positive, at most two decimal places, capped service-wide. The
/// engine re-checks the business bounds.
pub fn validate_amount(amount: Decimal) -> Result<(), axum::response::Response> {
    if amount <= Decimal::ZERO || amount > MAX_MOVEMENT_AMOUNT {
        return Err(errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_amount",
            format!("amount must be positive and at most {MAX_MOVEMENT_AMOUNT}"),
        ));
    }
    if amount.round_dp(2) != amount {
        return Err(errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_amount",
            "amount must have at most 2 decimal places",
        ));
    }
    Ok(())
}

pub fn validate_rate(rate: Decimal) -> Result<(), axum::response::Response> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_rate",
            "rate must be a fraction within [0, 1]",
        ));
    }
    Ok(())
}

// -------------------------
// Response mapping
// -------------------------

pub fn account_to_json(account: &Account) -> Value {
    json!({
        "account_number": account.account_number,
        "balance": account.balance,
        "interest_rate": account.interest_rate,
        "created_at": account.created_at,
        "last_interest_payout": account.last_interest_payout,
    })
}

pub fn user_detail_to_json(detail: &UserDetail) -> Value {
    json!({
        "username": detail.user.username,
        "fullname": detail.user.fullname,
        "role": detail.user.role.as_str(),
        "account": account_to_json(&detail.account),
    })
}

pub fn payout_run_to_json(run: &PayoutRun) -> Value {
    json!({
        "considered": run.considered,
        "paid": run.paid,
        "accounts": run.accounts.iter().map(account_to_json).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn username_bounds() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("alice_99").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("semi;colon").is_err());
    }

    #[test]
    fn amount_bounds() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(100.50)).is_ok());
        assert!(validate_amount(MAX_MOVEMENT_AMOUNT).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(dec!(-1)).is_err());
        assert!(validate_amount(dec!(0.001)).is_err());
        assert!(validate_amount(MAX_MOVEMENT_AMOUNT + dec!(0.01)).is_err());
    }

    #[test]
    fn rate_bounds() {
        assert!(validate_rate(Decimal::ZERO).is_ok());
        assert!(validate_rate(dec!(0.10)).is_ok());
        assert!(validate_rate(Decimal::ONE).is_ok());
        assert!(validate_rate(dec!(1.01)).is_err());
        assert!(validate_rate(dec!(-0.01)).is_err());
    }
}
