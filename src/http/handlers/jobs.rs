use crate::jobs::schedule::{run_job, JobName, JobOverrides, JobRun};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn trigger_job(
    State(state): State<AppState>,
    Path(job): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let Some(name) = JobName::parse(&job) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown job {}", job)})),
        )
            .into_response();
    };

    let overrides: JobOverrides = if body.iter().all(u8::is_ascii_whitespace) {
        JobOverrides::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(o) => o,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": format!("invalid body: {}", e)})),
                )
                    .into_response()
            }
        }
    };

    match run_job(name, &state.jobs, state.slot_ledger.as_ref(), &overrides, chrono::Utc::now()).await {
        Ok(JobRun::Ran(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(JobRun::SlotClaimed) => {
            (StatusCode::OK, Json(json!({"skipped": "slot already claimed"}))).into_response()
        }
        Err(e) => {
            tracing::error!("job {} failed: {:#}", name.as_str(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("{:#}", e)})),
            )
                .into_response()
        }
    }
}
