use anyhow::Result;
use pix_payouts::bootstrap::{Pipeline, Stores};
use pix_payouts::config::AppConfig;
use pix_payouts::gateways::provider_from_config;
use pix_payouts::jobs::JobSettings;
use pix_payouts::queue::redis_queue::RedisJobQueue;
use pix_payouts::queue::worker::{JobHandler, QueueWorker};
use pix_payouts::queue::{JobQueue, PAYOUT_QUEUE, PIX_KEY_REGISTRATION_QUEUE, WEBHOOK_QUEUE};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Runs the webhook, payout and key-registration workers in one process.
/// Receipts are consumed by the notification service.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    let provider = provider_from_config(&cfg)?;
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(&cfg.redis_url, cfg.dedup_retention_secs)?);
    let pipeline = Pipeline::assemble(
        Stores::postgres(&pool),
        queue.clone(),
        provider,
        JobSettings::from_config(&cfg),
    );

    let workers: Vec<(&str, Arc<dyn JobHandler>)> = vec![
        (WEBHOOK_QUEUE, pipeline.router.clone() as Arc<dyn JobHandler>),
        (PAYOUT_QUEUE, pipeline.payouts.clone() as Arc<dyn JobHandler>),
        (PIX_KEY_REGISTRATION_QUEUE, pipeline.key_validation.clone() as Arc<dyn JobHandler>),
    ];

    let mut tasks = Vec::new();
    for (name, handler) in workers {
        let worker = QueueWorker::new(name, queue.clone(), handler, cfg.queue_settings(name));
        tasks.push(tokio::spawn(worker.run()));
    }

    for task in tasks {
        task.await?;
    }
    Ok(())
}
