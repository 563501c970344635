use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use bankd_auth::{Capability, Principal};
use bankd_store::LedgerStore;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/withdrawal", post(withdrawal::<S>))
        .route("/deposit", post(deposit::<S>))
        .route("/balance/:username", get(balance::<S>))
        .route("/interest-rate", put(interest_rate::<S>))
        .route("/interest-payout", post(interest_payout::<S>))
}

pub async fn withdrawal<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_username(&body.username) {
        return resp;
    }
    if let Err(resp) = dto::validate_amount(body.amount) {
        return resp;
    }
    if let Err(resp) = common::require_own_funds(&principal, &body.username) {
        return resp;
    }

    match services.engine.withdraw(&body.username, body.amount).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

pub async fn deposit<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_username(&body.username) {
        return resp;
    }
    if let Err(resp) = dto::validate_amount(body.amount) {
        return resp;
    }
    if let Err(resp) = common::require_own_funds(&principal, &body.username) {
        return resp;
    }

    match services.engine.deposit(&body.username, body.amount).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

pub async fn balance<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_username(&username) {
        return resp;
    }
    if let Err(resp) = common::require_self_or(&principal, &username, Capability::ViewAnyAccount) {
        return resp;
    }

    match services.engine.account_balance(&username).await {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

pub async fn interest_rate<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::InterestRateRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_username(&body.username) {
        return resp;
    }
    if let Err(resp) = dto::validate_rate(body.rate) {
        return resp;
    }
    if let Err(resp) = common::require(&principal, Capability::SetInterestRate) {
        return resp;
    }

    match services
        .engine
        .update_interest_rate(&body.username, body.rate)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

/// On-demand payout batch, same code path as the scheduled worker.
pub async fn interest_payout<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&principal, Capability::TriggerPayout) {
        return resp;
    }

    match services.engine.interest_payout(None).await {
        Ok(run) => (StatusCode::OK, Json(dto::payout_run_to_json(&run))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}
