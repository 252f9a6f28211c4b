use std::sync::Arc;

use anyhow::Context;
use operator_events::InMemoryEventBus;
use operator_infra::config::NotificationConfig;
use operator_infra::event_bus::RedisPubSubEventBus;
use operator_notification::app::{build_app, start_projection, NotificationState};
use operator_notification::projection::NotificationProjection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    operator_observability::init("notification-service");

    let config = NotificationConfig::from_env()?;
    let projection = Arc::new(NotificationProjection::new());
    let local_bus = InMemoryEventBus::new();

    let worker = match &config.redis_url {
        Some(url) => {
            let bus = RedisPubSubEventBus::new(url, &config.notification_channel)?;
            tracing::info!(channel = bus.channel(), "subscribing over redis pub/sub");
            start_projection(&bus, Arc::clone(&projection))?
        }
        None => {
            tracing::warn!("USE_PERSISTENT_STORES is off; nothing outside this process can publish");
            start_projection(&local_bus, Arc::clone(&projection))?
        }
    };

    let app = build_app(Arc::new(NotificationState {
        projection,
        show_notification_count: config.show_notification_count,
    }));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    worker.shutdown();
    Ok(())
}
