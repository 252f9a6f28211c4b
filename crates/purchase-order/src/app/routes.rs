use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::order::PurchaseOrderRequest;

use super::errors;
use super::services::PurchaseOrderServices;

/// Routes nested under `/v1/purchase-order`.
pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order))
        .route("/errors", get(error_records))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn place_order(
    Extension(services): Extension<Arc<PurchaseOrderServices>>,
    body: Result<Json<PurchaseOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(order) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.place_order(order).await {
        Ok(purchase) => (StatusCode::CREATED, Json(purchase)).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn error_records(
    Extension(services): Extension<Arc<PurchaseOrderServices>>,
) -> axum::response::Response {
    match services.error_records().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}
