use crate::http::handlers::{jobs, ops, webhooks};
use crate::http::middleware::bearer_auth::{require_bearer_token, BearerAuthState};
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub fn build_router(state: AppState, jobs_auth: BearerAuthState) -> Router {
    let job_routes = Router::new()
        .route("/jobs/:job_name", post(jobs::trigger_job))
        .layer(from_fn_with_state(jobs_auth, require_bearer_token));

    Router::new()
        .route("/webhook/pagamento/:gateway", post(webhooks::receive_payment))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .merge(job_routes)
        .with_state(state)
}
