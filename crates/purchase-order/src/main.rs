use std::sync::Arc;

use anyhow::Context;
use operator_infra::config::PurchaseOrderConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    operator_observability::init("purchase-order-service");

    let config = PurchaseOrderConfig::from_env()?;
    let services = operator_purchase_order::app::build_services(&config).await?;
    let app = operator_purchase_order::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
