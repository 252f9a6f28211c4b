use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::NotificationState;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/settings", get(settings))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn list_notifications(
    Extension(state): Extension<Arc<NotificationState>>,
) -> axum::response::Response {
    match state.projection.all() {
        Ok(items) => Json(items).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "notification projection unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "projection_error",
                    "message": "notifications are unavailable",
                })),
            )
                .into_response()
        }
    }
}

pub async fn settings(Extension(state): Extension<Arc<NotificationState>>) -> String {
    format!(
        "Notification count will be shown: {}",
        state.show_notification_count
    )
}
