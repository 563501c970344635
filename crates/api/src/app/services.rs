//! Service wiring shared by every handler.

use std::sync::Arc;

use rust_decimal::Decimal;

use bankd_engine::{LedgerEngine, UserService};
use bankd_store::LedgerStore;

/// The engine and user service, shared via a request extension.
pub struct AppServices<S: LedgerStore> {
    pub engine: LedgerEngine<S>,
    pub users: UserService<S>,
}

pub fn build_services<S: LedgerStore>(
    store: Arc<S>,
    default_interest_rate: Decimal,
) -> AppServices<S> {
    AppServices {
        engine: LedgerEngine::new(store.clone()),
        users: UserService::new(store, default_interest_rate),
    }
}
