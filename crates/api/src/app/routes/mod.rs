use axum::Router;

pub mod accounts;
pub mod customers;
pub mod packages;
pub mod purchases;
pub mod system;

/// Router for the versioned resource endpoints (nested under `/v1`).
pub fn router() -> Router {
    Router::new()
        .nest("/customers", customers::router())
        .nest("/accounts", accounts::router())
        .nest("/packages", packages::router())
        .nest("/purchases", purchases::router())
}
