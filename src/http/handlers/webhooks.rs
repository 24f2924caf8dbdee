use crate::error::PipelineError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Acknowledges with 200 everything except a payload we could not durably
/// queue, which gets 503 so the gateway redelivers it.
pub async fn receive_payment(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("webhook from {} is not json, dropped: {}", gateway, e);
            return (
                StatusCode::OK,
                Json(json!({"received": 0, "enqueued": 0, "duplicates": 0, "dropped": 1})),
            )
                .into_response();
        }
    };

    match state.ingestor.ingest(&gateway, &payload).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) if PipelineError::is_queue_unavailable(&e) => {
            tracing::error!("webhook from {} not queued, asking gateway to retry: {:#}", gateway, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "queue unavailable"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("webhook from {} failed: {:#}", gateway, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
