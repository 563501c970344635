use std::sync::Arc;

use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use bankd_store::MemoryLedgerStore;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Same router as prod, over the in-memory store, on an ephemeral port.
    async fn spawn() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let app = bankd_api::app::build_app(store, dec!(0.05));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn bootstrap_root(&self, client: &reqwest::Client) {
        let res = client
            .post(format!("{}/users/bootstrap", self.base_url))
            .json(&json!({
                "username": "root",
                "fullname": "Root Admin",
                "password": "rootpw",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    /// Create a user through the API as root; returns nothing, panics on failure.
    async fn create_user(&self, client: &reqwest::Client, username: &str, role: &str) {
        let res = client
            .post(format!("{}/users", self.base_url))
            .basic_auth("root", Some("rootpw"))
            .json(&json!({
                "username": username,
                "fullname": format!("{username} Test"),
                "password": "pw",
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "creating {username}");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .basic_auth("alice", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bootstrap_works_once_then_conflicts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;

    let res = client
        .post(format!("{}/users/bootstrap", srv.base_url))
        .json(&json!({
            "username": "root2",
            "fullname": "Second Root",
            "password": "pw",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn deposit_then_balance_reflects_the_movement() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;

    let res = client
        .post(format!("{}/account/deposit", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .json(&json!({ "username": "alice", "amount": "250.75" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["balance"].as_str().unwrap(), "250.75");
    assert_eq!(body["account_number"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn over_withdrawal_is_unprocessable_and_balance_is_untouched() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;

    let res = client
        .post(format!("{}/account/deposit", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .json(&json!({ "username": "alice", "amount": "300.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/account/withdrawal", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .json(&json!({ "username": "alice", "amount": "500.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "insufficient_balance");

    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["balance"].as_str().unwrap(), "300.00");
}

#[tokio::test]
async fn customers_cannot_touch_other_accounts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;
    srv.create_user(&client, "bob", "customer").await;

    // Bob cannot deposit into Alice's account.
    let res = client
        .post(format!("{}/account/deposit", srv.base_url))
        .basic_auth("bob", Some("pw"))
        .json(&json!({ "username": "alice", "amount": "10.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Bob cannot read Alice's balance.
    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .basic_auth("bob", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Root can.
    let res = client
        .get(format!("{}/account/balance/alice", srv.base_url))
        .basic_auth("root", Some("rootpw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_user_managers_create_users() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "adm", "admin").await;

    // Admins lack the user-management capability.
    let res = client
        .post(format!("{}/users", srv.base_url))
        .basic_auth("adm", Some("pw"))
        .json(&json!({
            "username": "eve",
            "fullname": "Eve Test",
            "password": "pw",
            "role": "customer",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Duplicate usernames conflict.
    let res = client
        .post(format!("{}/users", srv.base_url))
        .basic_auth("root", Some("rootpw"))
        .json(&json!({
            "username": "adm",
            "fullname": "Duplicate",
            "password": "pw",
            "role": "customer",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn interest_rate_and_payout_are_admin_operations() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;
    srv.create_user(&client, "adm", "admin").await;

    // Customers cannot set rates.
    let res = client
        .put(format!("{}/account/interest-rate", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .json(&json!({ "username": "alice", "rate": "0.50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Admins can.
    let res = client
        .put(format!("{}/account/interest-rate", srv.base_url))
        .basic_auth("adm", Some("pw"))
        .json(&json!({ "username": "alice", "rate": "0.15" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Out-of-range rate is rejected before the engine runs.
    let res = client
        .put(format!("{}/account/interest-rate", srv.base_url))
        .basic_auth("adm", Some("pw"))
        .json(&json!({ "username": "alice", "rate": "1.5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // On-demand payout runs and reports its counts.
    let res = client
        .post(format!("{}/account/interest-payout", srv.base_url))
        .basic_auth("adm", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    // root, alice, and adm all have accounts.
    assert_eq!(body["considered"].as_u64().unwrap(), 3);
    assert_eq!(body["paid"].as_u64().unwrap(), 3);
}

#[tokio::test]
async fn malformed_amounts_are_rejected_at_the_edge() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;

    for amount in ["0", "-5.00", "0.001", "1000000000000.01"] {
        let res = client
            .post(format!("{}/account/deposit", srv.base_url))
            .basic_auth("alice", Some("pw"))
            .json(&json!({ "username": "alice", "amount": amount }))
            .send()
            .await
            .unwrap();
        assert_eq!(
            res.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "amount {amount}"
        );
    }
}

#[tokio::test]
async fn role_updates_take_effect_immediately() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bootstrap_root(&client).await;
    srv.create_user(&client, "alice", "customer").await;

    let res = client
        .put(format!("{}/users/alice/role", srv.base_url))
        .basic_auth("root", Some("rootpw"))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Alice can now read other accounts.
    let res = client
        .get(format!("{}/account/balance/root", srv.base_url))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
