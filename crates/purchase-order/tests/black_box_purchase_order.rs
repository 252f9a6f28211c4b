use std::sync::Arc;

use operator_api::app::AppServices;
use operator_events::InMemoryEventBus;
use operator_purchase_order::app::{build_app, PurchaseOrderServices};
use operator_purchase_order::error_record::InMemoryErrorRecordStore;
use operator_purchase_order::gateway::HttpPurchaseGateway;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct Spawned {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Spawned {
    async fn serve(app: axum::Router) -> Self {
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for Spawned {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Core service plus a purchase-order service forwarding to it.
async fn spawn_pair() -> (Spawned, Spawned) {
    let core = Spawned::serve(operator_api::app::build_app(Arc::new(AppServices::in_memory(
        Arc::new(InMemoryEventBus::new()),
        "notification",
    ))))
    .await;
    let orders = spawn_orders(&core.base_url).await;
    (core, orders)
}

async fn spawn_orders(core_url: &str) -> Spawned {
    let services = PurchaseOrderServices::new(
        Arc::new(HttpPurchaseGateway::new(core_url).unwrap()),
        Arc::new(InMemoryErrorRecordStore::new()),
    );
    Spawned::serve(build_app(Arc::new(services))).await
}

/// Seed a customer, an account with `balance`, and one package; returns
/// `(account_id, package_id)`.
async fn seed(client: &reqwest::Client, core: &Spawned, balance: &str, purchasable: bool) -> (String, i64) {
    let customer: Value = client
        .post(core.url("/v1/customers"))
        .json(&json!({
            "name": "Grace",
            "surname": "Hopper",
            "email": "grace@example.com",
            "password": "cobol1959"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let account: Value = client
        .post(core.url("/v1/accounts"))
        .json(&json!({
            "customerId": customer["id"],
            "accountBalance": balance
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let package: Value = client
        .post(core.url("/v1/packages"))
        .json(&json!({
            "name": "Night Surfer",
            "packageType": "INTERNET",
            "duration": 7,
            "purchasable": purchasable
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    (
        account["id"].as_str().unwrap().to_string(),
        package["id"].as_i64().unwrap(),
    )
}

async fn order(
    client: &reqwest::Client,
    orders: &Spawned,
    account_id: &str,
    package_id: i64,
    price: i64,
) -> reqwest::Response {
    client
        .post(orders.url("/v1/purchase-order"))
        .json(&json!({
            "accountId": account_id,
            "subPackageId": package_id,
            "packagePrice": price
        }))
        .send()
        .await
        .unwrap()
}

async fn error_records(client: &reqwest::Client, orders: &Spawned) -> Vec<Value> {
    client
        .get(orders.url("/v1/purchase-order/errors"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn fulfilled_order_returns_core_purchase() {
    let (core, orders) = spawn_pair().await;
    let client = reqwest::Client::new();
    let (account_id, package_id) = seed(&client, &core, "50", true).await;

    let res = order(&client, &orders, &account_id, package_id, 20).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let purchase: Value = res.json().await.unwrap();
    assert_eq!(purchase["subPackage"]["name"], "Night Surfer");

    let account: Value = client
        .get(core.url(&format!("/v1/accounts/{account_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(account["purchases"][0]["id"], purchase["id"]);
    assert!(error_records(&client, &orders).await.is_empty());
}

#[tokio::test]
async fn refusals_are_recorded_and_returned() {
    let (core, orders) = spawn_pair().await;
    let client = reqwest::Client::new();
    let (account_id, package_id) = seed(&client, &core, "5", true).await;

    let res = order(&client, &orders, &account_id, package_id, 20).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Insufficient account balance to make this purchase: Night Surfer with the price of 20. Payment Required."
    );

    let res = order(&client, &orders, &account_id, 404, 1).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let records = error_records(&client, &orders).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["code"], 402);
    assert_eq!(records[0]["message"], body["message"]);
    assert_eq!(records[1]["code"], 404);
    assert_eq!(records[1]["message"], "No package found with this id: 404");
}

#[tokio::test]
async fn closed_package_is_forbidden() {
    let (core, orders) = spawn_pair().await;
    let client = reqwest::Client::new();
    let (account_id, package_id) = seed(&client, &core, "100", false).await;

    let res = order(&client, &orders, &account_id, package_id, 1).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_records(&client, &orders).await[0]["code"], 403);
}

#[tokio::test]
async fn invalid_order_is_rejected_locally() {
    let (_core, orders) = spawn_pair().await;
    let client = reqwest::Client::new();

    let res = order(&client, &orders, "", 0, 1).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(error_records(&client, &orders).await.is_empty());
}

#[tokio::test]
async fn unreachable_core_is_recorded_as_unavailable() {
    // Nothing listens on the discard port.
    let orders = spawn_orders("http://127.0.0.1:9").await;
    let client = reqwest::Client::new();

    let res = order(&client, &orders, "acc", 1, 1).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let records = error_records(&client, &orders).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["code"], 503);
}
