pub mod bootstrap;
pub mod config;
pub mod error;
pub mod domain {
    pub mod charge;
    pub mod driver;
    pub mod event;
    pub mod jobs;
    pub mod money;
    pub mod transfer;
}
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod jobs;
        pub mod ops;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod bearer_auth;
    }
    pub mod routes;
}
pub mod jobs;
pub mod queue;
pub mod repo;
pub mod service {
    pub mod key_validation_service;
    pub mod payout_service;
}
pub mod webhook {
    pub mod ingest;
    pub mod passenger_handler;
    pub mod router;
    pub mod subscription_handler;
    pub mod translate;
}

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: webhook::ingest::WebhookIngestor,
    pub jobs: jobs::JobContext,
    pub slot_ledger: Arc<dyn jobs::schedule::SlotLedger>,
    /// Readiness probes; `None` skips the check.
    pub pool: Option<sqlx::PgPool>,
    pub redis_client: Option<redis::Client>,
}
