use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use operator_purchasing::PurchaseCreateRequest;

use crate::app::dto::{self, href};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase))
        .route("/:id", get(get_purchase).delete(delete_purchase))
}

/// Settle a purchase against an account. This is the endpoint the
/// purchase-order service forwards to.
pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<PurchaseCreateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.create_purchase(request).await {
        Ok((purchase, account)) => {
            let location = href::purchase(purchase.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(dto::purchase_resource(purchase, account)),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.get_purchase(&id).await {
        Ok((purchase, account)) => Json(dto::purchase_resource(purchase, account)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Delete a purchase and refund its price to the paying account.
pub async fn delete_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.delete_purchase(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
