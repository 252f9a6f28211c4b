use std::sync::Arc;

use operator_events::{Envelope, EventBus, InMemoryEventBus};
use operator_infra::workers::WorkerHandle;
use operator_notification::app::{build_app, start_projection, NotificationState};
use operator_notification::projection::NotificationProjection;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    bus: Arc<InMemoryEventBus<Envelope>>,
    worker: Option<WorkerHandle>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(show_notification_count: bool) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let projection = Arc::new(NotificationProjection::new());
        let worker = start_projection(&bus, Arc::clone(&projection)).unwrap();
        let app = build_app(Arc::new(NotificationState {
            projection,
            show_notification_count,
        }));

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
            bus,
            worker: Some(worker),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

async fn notifications_eventually(
    client: &reqwest::Client,
    server: &TestServer,
    expected: usize,
) -> Vec<Value> {
    // The projection is fed by a background worker; poll briefly.
    for _ in 0..100 {
        let items: Vec<Value> = client
            .get(server.url("/v1/notifications"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if items.len() >= expected {
            return items;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("notifications did not reach {expected} within timeout");
}

fn purchase(id: &str) -> Envelope {
    Envelope::new(
        "notification",
        json!({
            "id": id,
            "purchaseDate": "2024-05-01T10:00:00Z",
            "packagePrice": 25,
            "subPackage": { "id": 1, "name": "Gold", "packageType": "COMBO" }
        }),
    )
}

#[tokio::test]
async fn published_purchases_are_listed_in_order() {
    let server = TestServer::spawn(false).await;
    let client = reqwest::Client::new();

    server.bus.publish(purchase("p1")).unwrap();
    server
        .bus
        .publish(Envelope::new("notification", json!("garbage")))
        .unwrap();
    server.bus.publish(purchase("p2")).unwrap();

    let items = notifications_eventually(&client, &server, 2).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "p1");
    assert_eq!(items[1]["id"], "p2");
    assert_eq!(items[0]["subPackage"]["name"], "Gold");
    assert!(items[0].get("packagePrice").is_none());
}

#[tokio::test]
async fn settings_report_the_count_flag() {
    let client = reqwest::Client::new();

    for flag in [true, false] {
        let server = TestServer::spawn(flag).await;
        let res = client
            .get(server.url("/v1/notifications/settings"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.text().await.unwrap(),
            format!("Notification count will be shown: {flag}")
        );
    }
}

#[tokio::test]
async fn empty_projection_lists_nothing() {
    let server = TestServer::spawn(false).await;
    let res = reqwest::get(server.url("/v1/notifications")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let items: Vec<Value> = res.json().await.unwrap();
    assert!(items.is_empty());
}
