use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use operator_core::{DomainError, ValidationErrors};
use operator_infra::store::StoreError;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Database(msg) => {
            tracing::error!(error = %msg, "store operation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "the request could not be completed",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(errors) => validation_error(errors),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::InsufficientFunds(msg) => {
            json_error(StatusCode::PAYMENT_REQUIRED, "insufficient_funds", msg)
        }
        DomainError::PurchaseNotPossible(msg) => {
            json_error(StatusCode::FORBIDDEN, "purchase_not_possible", msg)
        }
    }
}

/// 400 with one entry per violated field constraint.
pub fn validation_error(errors: ValidationErrors) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": errors.to_string(),
            "errors": errors.violations(),
        })),
    )
        .into_response()
}

/// Malformed JSON, wrong content type, or a value out of the field's type range.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "malformed_request", rejection.body_text())
}

/// Unwrap a JSON body, or produce the 400 response for its rejection.
pub fn json_body<T>(
    body: Result<axum::Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    body.map(|axum::Json(value)| value)
        .map_err(json_rejection_to_response)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
