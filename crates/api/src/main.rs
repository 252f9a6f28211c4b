use std::sync::Arc;

use anyhow::Context;
use operator_infra::config::CoreConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    operator_observability::init("core-service");

    let config = CoreConfig::from_env()?;
    let services = operator_api::app::build_services(&config).await?;
    let app = operator_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
