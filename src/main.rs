use pix_payouts::bootstrap::{Pipeline, Stores};
use pix_payouts::config::AppConfig;
use pix_payouts::gateways::provider_from_config;
use pix_payouts::http::middleware::bearer_auth::BearerAuthState;
use pix_payouts::http::routes::build_router;
use pix_payouts::jobs::schedule::RedisSlotLedger;
use pix_payouts::jobs::JobSettings;
use pix_payouts::queue::redis_queue::RedisJobQueue;
use pix_payouts::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let provider = provider_from_config(&cfg)?;
    let queue = Arc::new(RedisJobQueue::new(&cfg.redis_url, cfg.dedup_retention_secs)?);
    let pipeline = Pipeline::assemble(
        Stores::postgres(&pool),
        queue,
        provider.clone(),
        JobSettings::from_config(&cfg),
    );

    let state = AppState {
        ingestor: pipeline.ingestor.clone(),
        jobs: pipeline.jobs.clone(),
        slot_ledger: Arc::new(RedisSlotLedger::new(&cfg.redis_url)?),
        pool: Some(pool),
        redis_client: Some(redis::Client::open(cfg.redis_url.clone())?),
    };

    let app = build_router(state, BearerAuthState::new(&cfg.jobs_api_token));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {} with gateway {}", cfg.bind_addr, provider.name());
    axum::serve(listener, app).await?;
    Ok(())
}
