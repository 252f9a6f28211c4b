//! HTTP application wiring for the purchase-order service.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, OrderError, PurchaseOrderServices};

pub fn build_app(services: Arc<PurchaseOrderServices>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/v1/purchase-order", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
