//! HTTP application wiring for the core service.
//!
//! - `services.rs`: use cases over the store, graph loading, notification publishing
//! - `routes/`: HTTP handlers (one file per resource)
//! - `dto.rs`: response representations and hypermedia links
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices, PurchaseNotifier};

/// Build the full HTTP router around already-wired services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
