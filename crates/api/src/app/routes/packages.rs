use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use operator_packages::PackageRequest;

use crate::app::dto::{self, href, Collection};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_packages).post(create_package))
        .route(
            "/:id",
            get(get_package).put(replace_package).delete(delete_package),
        )
        .route("/:id/accounts", get(package_accounts))
}

pub async fn create_package(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<PackageRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.create_package(request).await {
        Ok(package) => {
            let location = href::package(package.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(dto::package_resource(package)),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_packages(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_packages().await {
        Ok(packages) => {
            let items = packages.into_iter().map(dto::package_resource).collect();
            Json(Collection::new("subPackages", items, href::packages())).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.get_package(&id).await {
        Ok(package) => Json(dto::package_resource(package)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Full replacement: every mutable field is taken from the body.
pub async fn replace_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<PackageRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.replace_package(&id, request).await {
        Ok(package) => Json(dto::package_resource(package)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.delete_package(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn package_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match services.package_accounts(&id).await {
        Ok(holders) => {
            let items = holders.into_iter().map(dto::holder_resource).collect();
            let self_href = format!("/v1/packages/{id}/accounts");
            Json(Collection::new("accounts", items, self_href)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
