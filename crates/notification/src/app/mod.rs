//! HTTP application and background wiring for the notification service.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use operator_events::{Envelope, EventBus};
use operator_infra::workers::{ProjectionWorker, WorkerHandle};

use crate::projection::NotificationProjection;

pub mod routes;

/// State shared by the handlers.
pub struct NotificationState {
    pub projection: Arc<NotificationProjection>,
    pub show_notification_count: bool,
}

pub fn build_app(state: Arc<NotificationState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/v1/notifications", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(state)))
}

/// Subscribe the projection to `bus` on a background worker.
pub fn start_projection<B>(
    bus: &B,
    projection: Arc<NotificationProjection>,
) -> std::io::Result<WorkerHandle>
where
    B: EventBus<Envelope> + ?Sized,
{
    ProjectionWorker::spawn("notification-projection", bus, move |envelope: Envelope| {
        projection.apply(&envelope)
    })
}
