use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use operator_customers::{AccountCreateRequest, AccountUpdateRequest};

use crate::app::dto::{self, href, Collection};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route(
            "/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/:id/purchases", get(account_purchases))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<AccountCreateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.create_account(request).await {
        Ok(account) => {
            let location = href::account(account.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(dto::account_resource(account)),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_accounts().await {
        Ok(accounts) => {
            let items = accounts.into_iter().map(dto::account_resource).collect();
            Json(Collection::new("accounts", items, href::accounts())).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.get_account(&id).await {
        Ok(account) => Json(dto::account_resource(account)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<AccountUpdateRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.update_account(&id, request).await {
        Ok(account) => Json(dto::account_resource(account)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.delete_account(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn account_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.account_purchases(&id).await {
        Ok(purchases) => {
            let items = purchases
                .into_iter()
                .map(|p| {
                    let id = p.id;
                    dto::Resource::new(p).link("self", href::purchase(id))
                })
                .collect();
            let self_href = format!("/v1/accounts/{id}/purchases");
            Json(Collection::new("purchases", items, self_href)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
