use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use operator_core::ValidationErrors;
use operator_infra::config::PurchaseOrderConfig;

use crate::error_record::{
    ErrorRecord, ErrorRecordStore, ErrorRecordStoreError, InMemoryErrorRecordStore,
    RedisErrorRecordStore,
};
use crate::gateway::{GatewayError, HttpPurchaseGateway, PurchaseGateway};
use crate::order::PurchaseOrderRequest;

/// Status recorded and returned when the core service cannot be reached.
pub const UNAVAILABLE: u16 = 503;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),

    /// The purchase failed downstream; an error record was written.
    #[error("{message}")]
    Failed { status: u16, message: String },

    #[error(transparent)]
    Records(#[from] ErrorRecordStoreError),
}

pub struct PurchaseOrderServices {
    gateway: Arc<dyn PurchaseGateway>,
    records: Arc<dyn ErrorRecordStore>,
}

impl PurchaseOrderServices {
    pub fn new(gateway: Arc<dyn PurchaseGateway>, records: Arc<dyn ErrorRecordStore>) -> Self {
        Self { gateway, records }
    }

    /// Forward the order to the core service.
    ///
    /// A refusal or transport failure is recorded, then returned to the caller
    /// with the same status and message. If the record cannot be written the
    /// caller gets the store failure instead.
    pub async fn place_order(
        &self,
        order: PurchaseOrderRequest,
    ) -> Result<serde_json::Value, OrderError> {
        info!(
            account_id = %order.account_id,
            sub_package_id = order.sub_package_id,
            package_price = order.package_price,
            "New purchase order has been recorded"
        );
        order.validated().map_err(OrderError::Invalid)?;

        let (status, message) = match self.gateway.create_purchase(&order).await {
            Ok(purchase) => {
                info!(account_id = %order.account_id, "purchase order fulfilled");
                return Ok(purchase);
            }
            Err(GatewayError::Rejected { status, message }) => (status, message),
            Err(GatewayError::Transport(cause)) => {
                warn!(error = %cause, "core service unreachable");
                (UNAVAILABLE, "Core service is unavailable".to_string())
            }
        };

        let record = ErrorRecord::new(i16::try_from(status).unwrap_or(i16::MAX), message.clone());
        // A refusal that cannot be recorded is a server failure, not the refusal.
        if let Err(e) = self.records.save(&record).await {
            error!(error = %e, code = record.code, "failed to save error record");
            return Err(e.into());
        }
        info!(record_id = %record.id, code = record.code, "error record saved");
        Err(OrderError::Failed { status, message })
    }

    pub async fn error_records(&self) -> Result<Vec<ErrorRecord>, OrderError> {
        Ok(self.records.all().await?)
    }
}

/// Wire the services from configuration: Redis-backed records when persistent
/// stores are enabled, otherwise in memory.
pub async fn build_services(config: &PurchaseOrderConfig) -> anyhow::Result<PurchaseOrderServices> {
    let gateway = HttpPurchaseGateway::new(&config.core_service_url)?;
    info!(endpoint = gateway.endpoint(), "forwarding purchase orders");

    let records: Arc<dyn ErrorRecordStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisErrorRecordStore::connect(url).await?),
        None => {
            warn!("USE_PERSISTENT_STORES is off; error records live in memory");
            Arc::new(InMemoryErrorRecordStore::new())
        }
    };

    Ok(PurchaseOrderServices::new(Arc::new(gateway), records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Scripted(Result<serde_json::Value, GatewayError>);

    #[async_trait]
    impl PurchaseGateway for Scripted {
        async fn create_purchase(
            &self,
            _order: &PurchaseOrderRequest,
        ) -> Result<serde_json::Value, GatewayError> {
            self.0.clone()
        }
    }

    fn services(reply: Result<serde_json::Value, GatewayError>) -> PurchaseOrderServices {
        PurchaseOrderServices::new(
            Arc::new(Scripted(reply)),
            Arc::new(InMemoryErrorRecordStore::new()),
        )
    }

    fn order() -> PurchaseOrderRequest {
        PurchaseOrderRequest {
            account_id: "acc".into(),
            sub_package_id: 1,
            package_price: 10,
        }
    }

    #[tokio::test]
    async fn success_returns_core_reply_and_records_nothing() {
        let svc = services(Ok(serde_json::json!({"id": "p1"})));
        let reply = svc.place_order(order()).await.unwrap();
        assert_eq!(reply["id"], "p1");
        assert!(svc.error_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_is_recorded_and_surfaced() {
        let svc = services(Err(GatewayError::Rejected {
            status: 402,
            message: "Payment Required.".into(),
        }));
        let err = svc.place_order(order()).await.unwrap_err();
        assert!(matches!(err, OrderError::Failed { status: 402, .. }));

        let records = svc.error_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, 402);
        assert_eq!(records[0].message, "Payment Required.");
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_as_unavailable() {
        let svc = services(Err(GatewayError::Transport("refused".into())));
        let err = svc.place_order(order()).await.unwrap_err();
        assert!(matches!(err, OrderError::Failed { status: 503, .. }));
        assert_eq!(svc.error_records().await.unwrap()[0].code, 503);
    }

    struct Broken;

    #[async_trait]
    impl ErrorRecordStore for Broken {
        async fn save(&self, _record: &ErrorRecord) -> Result<(), ErrorRecordStoreError> {
            Err(ErrorRecordStoreError::Poisoned)
        }

        async fn all(&self) -> Result<Vec<ErrorRecord>, ErrorRecordStoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn unrecordable_rejection_is_a_store_failure() {
        let svc = PurchaseOrderServices::new(
            Arc::new(Scripted(Err(GatewayError::Rejected {
                status: 404,
                message: "No package found with this id: 1".into(),
            }))),
            Arc::new(Broken),
        );
        let err = svc.place_order(order()).await.unwrap_err();
        assert!(matches!(err, OrderError::Records(ErrorRecordStoreError::Poisoned)));
    }

    #[tokio::test]
    async fn invalid_order_is_not_forwarded_or_recorded() {
        let svc = services(Ok(serde_json::json!({})));
        let mut bad = order();
        bad.sub_package_id = 0;
        let err = svc.place_order(bad).await.unwrap_err();
        assert!(matches!(err, OrderError::Invalid(ref e) if e.has_field("subPackageId")));
        assert!(svc.error_records().await.unwrap().is_empty());
    }
}
