use anyhow::Result;
use pix_payouts::bootstrap::{Pipeline, Stores};
use pix_payouts::config::AppConfig;
use pix_payouts::gateways::provider_from_config;
use pix_payouts::jobs::schedule::{run_job, JobName, JobOverrides, JobRun, RedisSlotLedger};
use pix_payouts::jobs::JobSettings;
use pix_payouts::queue::redis_queue::RedisJobQueue;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let provider = provider_from_config(&cfg)?;
    let queue = Arc::new(RedisJobQueue::new(&cfg.redis_url, cfg.dedup_retention_secs)?);
    let pipeline = Pipeline::assemble(
        Stores::postgres(&pool),
        queue,
        provider,
        JobSettings::from_config(&cfg),
    );
    let ledger = RedisSlotLedger::new(&cfg.redis_url)?;
    let overrides = JobOverrides::default();

    loop {
        for name in JobName::ALL {
            match run_job(name, &pipeline.jobs, &ledger, &overrides, chrono::Utc::now()).await {
                Ok(JobRun::Ran(report)) if report.failed > 0 => {
                    tracing::warn!("{} finished with {} failed items", name.as_str(), report.failed)
                }
                Ok(_) => {}
                Err(e) => tracing::error!("{} run failed: {:#}", name.as_str(), e),
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    }
}
