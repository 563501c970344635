use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

use bankd_api::config::Config;
use bankd_engine::spawn_payout_worker;
use bankd_store::PgLedgerStore;

#[tokio::main]
async fn main() {
    bankd_api::observability::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let store = Arc::new(PgLedgerStore::new(pool));
    store.migrate().await.expect("failed to run migrations");

    // The worker gets the shutdown signal first so a running batch stops
    // at an account boundary before the process exits.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = spawn_payout_worker(store.clone(), config.worker, shutdown_rx);

    let app = bankd_api::app::build_app(store, config.default_interest_rate);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    tracing::info!(
        addr = %config.bind_addr,
        period = ?config.worker.period(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let stats = worker.join().await;
    tracing::info!(
        runs = stats.runs,
        accounts_paid = stats.accounts_paid,
        failed_runs = stats.failed_runs,
        "payout worker drained; exiting"
    );
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
