//! End-to-end tests for the refresh pipeline against a mock site.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use food_recommendation::config::AppConfig;
use food_recommendation::history::{OrderStore, ORDERS_JSON_FILE};
use food_recommendation::pipeline::{refresh_orders, reparse_orders, RefreshObserver, RefreshStage};
use food_recommendation::Error;

#[derive(Default)]
struct RecordingObserver {
    stages: Mutex<Vec<RefreshStage>>,
}

#[async_trait]
impl RefreshObserver for RecordingObserver {
    async fn on_stage(&self, stage: RefreshStage) {
        self.stages.lock().unwrap().push(stage);
    }
}

fn config_for(server: &MockServer, dir: &TempDir, with_credentials: bool) -> AppConfig {
    let mut vars = HashMap::from([
        ("TGO_SITE_URL".to_string(), server.uri()),
        ("TGO_API_URL".to_string(), server.uri()),
        ("FOOD_BOT_DATA_DIR".to_string(), dir.path().display().to_string()),
        ("HTTP_TIMEOUT_SECS".to_string(), "5".to_string()),
    ]);
    if with_credentials {
        vars.insert("TGO_USERNAME".to_string(), "user@example.com".to_string());
        vars.insert("TGO_PASSWORD".to_string(), "hunter2".to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

async fn mount_login(server: &MockServer, login: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/giris"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrfToken": "csrf" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login)
        .mount(server)
        .await;
}

#[tokio::test]
async fn refresh_writes_json_and_csv_artifacts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "jwt" })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/web-checkout-apicheckout-santral/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [
                {
                    "product": { "name": "Chicken Burger" },
                    "store": { "name": "Burger Shop (Downtown)" },
                    "price": { "totalPrice": "215,50 TL" },
                    "orderDate": "2024-01-02 / 14:30",
                    "status": { "statusText": "Delivered" }
                },
                { "product": { "name": "Pizza" } }
            ]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, &dir, true);
    let store = OrderStore::new(dir.path());
    let observer = RecordingObserver::default();

    let report = refresh_orders(&config, &store, &observer)
        .await
        .expect("refresh should succeed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].restaurant_name, "Burger Shop");
    assert_eq!(report.records[0].price, Decimal::new(2155, 1));
    assert_eq!(report.records[1].restaurant_name, "Unknown");
    assert_eq!(report.json_path, dir.path().join(ORDERS_JSON_FILE));

    assert!(store.cookies_path().is_file());
    assert_eq!(store.read_records().unwrap(), report.records);

    let stages = observer.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            RefreshStage::LoggingIn,
            RefreshStage::TokenObtained,
            RefreshStage::LoggedIn,
            RefreshStage::Fetched { orders: 2 },
            RefreshStage::Saved {
                csv_path: report.csv_path.clone(),
                records: 2
            },
        ]
    );
}

#[tokio::test]
async fn failed_login_still_saves_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_login(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({ "error": "bad credentials" })),
    )
    .await;

    let config = config_for(&server, &dir, true);
    let store = OrderStore::new(dir.path());
    let observer = RecordingObserver::default();

    let err = refresh_orders(&config, &store, &observer).await.unwrap_err();

    assert!(matches!(err, Error::Credential { .. }), "got: {err:?}");
    assert!(store.cookies_path().is_file());
    assert!(!store.has_history());
    assert_eq!(
        observer.stages.lock().unwrap().last(),
        Some(&RefreshStage::TokenObtained)
    );
}

#[tokio::test]
async fn missing_credentials_stop_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = config_for(&server, &dir, false);
    let store = OrderStore::new(dir.path());
    let observer = RecordingObserver::default();

    let err = refresh_orders(&config, &store, &observer).await.unwrap_err();

    assert!(matches!(err, Error::MissingConfiguration(_)), "got: {err:?}");
    assert!(observer.stages.lock().unwrap().is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[test]
fn reparse_rebuilds_csv_from_saved_document() {
    let dir = TempDir::new().unwrap();
    let store = OrderStore::new(dir.path());

    std::fs::write(
        store.orders_json_path(),
        json!({
            "orders": [
                {
                    "product": { "name": "Latte" },
                    "store": { "name": "Caffe Nero (Moda)" },
                    "price": { "totalPrice": 95 },
                    "orderDate": "2024-03-05 / 09:10",
                    "status": { "statusText": "Delivered" }
                }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let report = reparse_orders(&store).expect("reparse should succeed");

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].restaurant_location, "Moda");
    assert_eq!(report.records[0].time, "09:10");
    assert!(store.has_history());
}
