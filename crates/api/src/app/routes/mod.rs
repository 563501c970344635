use axum::Router;

use bankd_store::LedgerStore;

pub mod accounts;
pub mod common;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router<S: LedgerStore>() -> Router {
    Router::new()
        .nest("/account", accounts::router::<S>())
        .nest("/users", users::router::<S>())
}
