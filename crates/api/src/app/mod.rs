//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine/user-service construction over a store
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs, validation, and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use rust_decimal::Decimal;

use bankd_store::LedgerStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over any store implementation.
///
/// `/health` and `/users/bootstrap` are public; everything else sits behind
/// Basic auth.
pub fn build_app<S: LedgerStore>(store: Arc<S>, default_interest_rate: Decimal) -> Router {
    let services = Arc::new(services::build_services(store, default_interest_rate));
    let auth_state = middleware::AuthState {
        users: services.users.clone(),
    };

    let protected = routes::router::<S>().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware::<S>,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/users/bootstrap", post(routes::users::bootstrap::<S>))
        .merge(protected)
        .layer(Extension(services))
}
