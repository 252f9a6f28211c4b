use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use super::services::OrderError;

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    match err {
        OrderError::Invalid(errors) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": errors.to_string(),
                "errors": errors.violations(),
            })),
        )
            .into_response(),
        OrderError::Failed { status, message } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            json_error(status, failure_code(status), message)
        }
        OrderError::Records(e) => {
            tracing::error!(error = %e, "error record store failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "error records are unavailable",
            )
        }
    }
}

fn failure_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::PAYMENT_REQUIRED => "insufficient_funds",
        StatusCode::FORBIDDEN => "purchase_not_possible",
        StatusCode::SERVICE_UNAVAILABLE => "core_unavailable",
        _ => "purchase_failed",
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "malformed_request", rejection.body_text())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_status_is_passed_through() {
        for status in [402u16, 403, 404, 503] {
            let resp = order_error_to_response(OrderError::Failed {
                status,
                message: "x".into(),
            });
            assert_eq!(resp.status().as_u16(), status);
        }
    }

    #[test]
    fn record_store_failure_is_internal_error() {
        let resp = order_error_to_response(OrderError::Records(
            crate::error_record::ErrorRecordStoreError::Poisoned,
        ));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
