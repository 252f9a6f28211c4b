use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use operator_customers::{CustomerCreateRequest, CustomerUpdateRequest};

use crate::app::dto::{self, href, Collection};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer).patch(update_customer).delete(delete_customer),
        )
        .route("/:id/accounts", get(customer_accounts))
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CustomerCreateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.create_customer(request).await {
        Ok(customer) => {
            let location = href::customer(customer.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(dto::customer_resource(customer)),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_customers().await {
        Ok(customers) => {
            let items = customers.into_iter().map(dto::customer_resource).collect();
            Json(Collection::new("customers", items, href::customers())).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.get_customer(&id).await {
        Ok(customer) => Json(dto::customer_resource(customer)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<CustomerUpdateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.update_customer(&id, request).await {
        Ok(customer) => Json(dto::customer_resource(customer)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.delete_customer(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn customer_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.customer_accounts(&id).await {
        Ok(accounts) => {
            let items = accounts.into_iter().map(dto::owned_account_resource).collect();
            let self_href = format!("/v1/customers/{id}/accounts");
            Json(Collection::new("accounts", items, self_href)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
