use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::Value;

use stockledger_api::app::{router_with_services, AppServices};
use stockledger_api::config::AppConfig;
use stockledger_auth::{JwtClaims, Role};
use stockledger_core::{Quantity, UserId};
use stockledger_infra::{StockStore, StoreTransaction};
use stockledger_stock::{Movement, Product, Stock, StockKey, StockTransaction, Warehouse};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    stock: Stock,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Spawn the app (same router as prod) on an ephemeral port, with P001
    /// holding 10 units in one warehouse.
    async fn spawn() -> Self {
        let config = AppConfig::new(JWT_SECRET);
        let services = Arc::new(AppServices::in_memory(&config));
        let stock = seed(&services).await;

        let app = router_with_services(&config, services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            stock,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn seed(services: &AppServices) -> Stock {
    let product = Product::new("P001", "Widget");
    let warehouse = Warehouse::new("Main");
    let key = StockKey::new(product.id, warehouse.id, "P001");
    let delivery = StockTransaction::new(
        key.clone(),
        "DN-0001",
        Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
        Quantity::new(10.0).unwrap(),
    );
    let mut stock = Stock::empty(key);
    stock.quantity = Quantity::new(10.0).unwrap();

    let mut tx = services.store().begin().await.unwrap();
    tx.insert_product(&product).await.unwrap();
    tx.insert_warehouse(&warehouse).await.unwrap();
    tx.record_transaction(&delivery).await.unwrap();
    tx.append_movement(&Movement::from_transaction(&delivery)).await.unwrap();
    tx.save_stock(&stock).await.unwrap();
    tx.commit().await.unwrap();
    stock
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn post_action(client: &reqwest::Client, srv: &TestServer, token: &str, form: &[(&str, &str)]) -> Value {
    let res = client
        .post(format!("{}/products/actions", srv.base_url))
        .bearer_auth(token)
        .form(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn form_token(client: &reqwest::Client, srv: &TestServer, token: &str) -> String {
    let body: Value = client
        .get(format!("{}/forms/token", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["multireqtoken"].as_str().unwrap().to_string()
}

async fn movements(client: &reqwest::Client, srv: &TestServer, token: &str) -> Value {
    let res = client
        .get(format!("{}/products/P001/movements", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

fn notice_codes(body: &Value) -> Vec<String> {
    body["notices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/products/actions", srv.base_url))
        .form(&[("action", "change-stock")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_stock_records_count_and_movement() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::WAREHOUSE]);
    let code = srv.stock.id.to_string();

    let body = post_action(
        &client,
        &srv,
        &token,
        &[
            ("action", "change-stock"),
            ("code", code.as_str()),
            ("mov-description", "cycle count"),
            ("mov-quantity", "7"),
        ],
    )
    .await;

    assert_eq!(body["handled"], true);
    assert_eq!(body["notices"][0]["level"], "notice");
    assert_eq!(notice_codes(&body), vec!["record-updated-correctly"]);

    let listing = movements(&client, &srv, &token).await;
    assert_eq!(listing["has_movements"], true);
    let latest = &listing["movements"][0];
    assert_eq!(latest["quantity"], -3.0);
    assert!(latest["document"].as_str().unwrap().starts_with("count "));
}

#[tokio::test]
async fn change_stock_with_unknown_code_reports_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::ADMIN]);

    let unknown = UserId::new().to_string();
    for code in ["", "not-a-stock", unknown.as_str()] {
        let body = post_action(
            &client,
            &srv,
            &token,
            &[("action", "change-stock"), ("code", code), ("mov-quantity", "7")],
        )
        .await;
        assert_eq!(body["notices"][0]["level"], "warning");
        assert_eq!(notice_codes(&body), vec!["record-not-found"], "code={code:?}");
    }

    let listing = movements(&client, &srv, &token).await;
    assert_eq!(listing["movements"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rebuilds_require_admin_and_a_fresh_form_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let clerk = mint_jwt(vec![Role::WAREHOUSE]);
    let admin = mint_jwt(vec![Role::ADMIN]);

    let clerk_token = form_token(&client, &srv, &clerk).await;
    let body = post_action(
        &client,
        &srv,
        &clerk,
        &[("action", "rebuild-stock"), ("code", "P001"), ("multireqtoken", clerk_token.as_str())],
    )
    .await;
    assert_eq!(notice_codes(&body), vec!["not-allowed-modify"]);

    let body = post_action(&client, &srv, &admin, &[("action", "rebuild-movements"), ("code", "P001")]).await;
    assert_eq!(notice_codes(&body), vec!["invalid-form-token"]);

    let admin_token = form_token(&client, &srv, &admin).await;
    let form = [
        ("action", "rebuild-movements"),
        ("code", "P001"),
        ("multireqtoken", admin_token.as_str()),
    ];
    let body = post_action(&client, &srv, &admin, &form).await;
    assert_eq!(notice_codes(&body), vec!["record-updated-correctly"]);

    let replayed = post_action(&client, &srv, &admin, &form).await;
    assert_eq!(notice_codes(&replayed), vec!["invalid-form-token"]);
}

#[tokio::test]
async fn change_then_rebuild_keeps_the_ledger_consistent() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(vec![Role::ADMIN]);
    let code = srv.stock.id.to_string();

    post_action(
        &client,
        &srv,
        &admin,
        &[("action", "change-stock"), ("code", code.as_str()), ("mov-quantity", "4.5")],
    )
    .await;
    let before = movements(&client, &srv, &admin).await;

    for action in ["rebuild-movements", "rebuild-stock"] {
        let token = form_token(&client, &srv, &admin).await;
        let body = post_action(
            &client,
            &srv,
            &admin,
            &[("action", action), ("code", "P001"), ("multireqtoken", token.as_str())],
        )
        .await;
        assert_eq!(notice_codes(&body), vec!["record-updated-correctly"], "{action}");
    }

    assert_eq!(movements(&client, &srv, &admin).await, before);
}

#[tokio::test]
async fn unknown_actions_are_ignored() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::ADMIN]);

    let body = post_action(&client, &srv, &token, &[("action", "delete"), ("code", "P001")]).await;

    assert_eq!(body["handled"], false);
    assert!(body["notices"].as_array().unwrap().is_empty());
    assert_eq!(movements(&client, &srv, &token).await["movements"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lists_warehouses() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::WAREHOUSE]);

    let body: Value = client
        .get(format!("{}/warehouses", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body[0]["name"], "Main");
    assert_eq!(body[0]["id"], srv.stock.warehouse_id.to_string());
}
