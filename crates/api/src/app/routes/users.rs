use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use bankd_auth::{Capability, Principal, Role};
use bankd_store::LedgerStore;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .route("/", post(create_user::<S>))
        .route("/:username", get(get_user::<S>))
        .route("/:username/role", put(update_role::<S>))
}

pub async fn create_user<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&principal, Capability::ManageUsers) {
        return resp;
    }
    if let Err(resp) = dto::validate_username(&body.username) {
        return resp;
    }
    let role = match Role::from_str(&body.role) {
        Ok(role) => role,
        Err(e) => return errors::bank_error_to_response(e),
    };

    match services
        .users
        .create_user(&body.username, &body.fullname, &body.password, role)
        .await
    {
        Ok(detail) => {
            (StatusCode::CREATED, Json(dto::user_detail_to_json(&detail))).into_response()
        }
        Err(e) => errors::bank_error_to_response(e),
    }
}

pub async fn get_user<S: LedgerStore>(
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

    match services.users.user_detail(&username).await {
        Ok(detail) => (StatusCode::OK, Json(dto::user_detail_to_json(&detail))).into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

pub async fn update_role<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    Json(body): Json<dto::UpdateRoleRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::require(&principal, Capability::ManageUsers) {
        return resp;
    }
    if let Err(resp) = dto::validate_username(&username) {
        return resp;
    }
    let role = match Role::from_str(&body.role) {
        Ok(role) => role,
        Err(e) => return errors::bank_error_to_response(e),
    };

    match services.users.update_role(&username, role).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok" })),
        )
            .into_response(),
        Err(e) => errors::bank_error_to_response(e),
    }
}

/// Unauthenticated first-run provisioning; refused once any user exists.
pub async fn bootstrap<S: LedgerStore>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::BootstrapRequest>,
) -> axum::response::Response {
    if let Err(resp) = dto::validate_username(&body.username) {
        return resp;
    }

    match services
        .users
        .bootstrap_super_admin(&body.username, &body.fullname, &body.password)
        .await
    {
        Ok(detail) => {
            (StatusCode::CREATED, Json(dto::user_detail_to_json(&detail))).into_response()
        }
        Err(e) => errors::bank_error_to_response(e),
    }
}
