//! Downstream call into the core service's purchase-creation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::order::PurchaseOrderRequest;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The core service answered with a non-success status.
    #[error("core service rejected the purchase ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The core service could not be reached or answered garbage.
    #[error("core service unavailable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait PurchaseGateway: Send + Sync {
    /// Create the purchase and return the core service's representation of it.
    async fn create_purchase(
        &self,
        order: &PurchaseOrderRequest,
    ) -> Result<serde_json::Value, GatewayError>;
}

/// [`PurchaseGateway`] over HTTP: `POST {core}/v1/purchases`.
#[derive(Debug, Clone)]
pub struct HttpPurchaseGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPurchaseGateway {
    pub fn new(core_service_url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/purchases", core_service_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PurchaseGateway for HttpPurchaseGateway {
    #[instrument(skip(self, order), fields(account_id = %order.account_id, sub_package_id = order.sub_package_id), err)]
    async fn create_purchase(
        &self,
        order: &PurchaseOrderRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(order)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "core service accepted the purchase");
            return res
                .json()
                .await
                .map_err(|e| GatewayError::Transport(format!("unreadable reply: {e}")));
        }

        let body = res
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("unreadable rejection ({status}): {e}")))?;
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&body, status.canonical_reason()),
        })
    }
}

/// Prefer the `message` of a JSON error body, then the raw body, then the
/// status reason.
fn rejection_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(serde_json::Value::String(message)) = map.get("message") {
            return message.clone();
        }
    }
    if !body.trim().is_empty() {
        return body.trim().to_string();
    }
    reason.unwrap_or("purchase failed").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_taken_from_json_error_body() {
        let body = r#"{"error":"insufficient_funds","message":"Payment Required."}"#;
        assert_eq!(rejection_message(body, Some("Payment Required")), "Payment Required.");
    }

    #[test]
    fn falls_back_to_raw_body_then_reason() {
        assert_eq!(rejection_message("boom", None), "boom");
        assert_eq!(rejection_message("", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(rejection_message("   ", None), "purchase failed");
    }

    #[tokio::test]
    async fn truncated_rejection_body_is_a_transport_failure() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            // Promise more body than is sent, then hang up.
            socket
                .write_all(b"HTTP/1.1 402 Payment Required\r\ncontent-length: 100\r\n\r\nshort")
                .await
                .unwrap();
        });

        let gw = HttpPurchaseGateway::new(&format!("http://{addr}")).unwrap();
        let order = PurchaseOrderRequest {
            account_id: "acc".into(),
            sub_package_id: 1,
            package_price: 1,
        };
        let err = gw.create_purchase(&order).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(ref m) if m.contains("402")));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let gw = HttpPurchaseGateway::new("http://core:8080/").unwrap();
        assert_eq!(gw.endpoint(), "http://core:8080/v1/purchases");
    }
}
