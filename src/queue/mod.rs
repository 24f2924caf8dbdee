use anyhow::Result;
use serde::Serialize;

pub mod job;
pub mod redis_queue;
pub mod token_bucket;
pub mod worker;

pub use job::{Job, JobState};

pub const WEBHOOK_QUEUE: &str = "webhook";
pub const PAYOUT_QUEUE: &str = "payout";
pub const RECEIPT_QUEUE: &str = "receipts";
pub const PIX_KEY_REGISTRATION_QUEUE: &str = "pix_key_registration";

#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub dedup_key: Option<String>,
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl EnqueueOptions {
    pub fn for_queue(queue: &str) -> Self {
        let s = QueueSettings::defaults_for(queue);
        Self {
            dedup_key: None,
            attempts: s.attempts,
            backoff_ms: s.backoff_ms,
        }
    }

    pub fn dedup(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.dedup_key = if key.is_empty() { None } else { Some(key) };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued(uuid::Uuid),
    /// An equivalent job is outstanding or completed recently.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { run_at: chrono::DateTime<chrono::Utc> },
    Dead,
}

/// At-least-once work queue with per-job dedup keys. Exhausted jobs are
/// kept in a dead set, never deleted.
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<EnqueueOutcome>;

    async fn dequeue(&self, queue: &str) -> Result<Option<Job>>;

    async fn complete(&self, job: &Job) -> Result<()>;

    async fn fail(&self, job: &Job, error: &str) -> Result<FailOutcome>;

    /// Puts jobs claimed longer than `older_than` ago back on the ready
    /// list (worker crashed mid-job), or in the dead set once their attempt
    /// budget is spent. Returns how many jobs moved.
    async fn requeue_stalled(&self, queue: &str, older_than: std::time::Duration) -> Result<usize>;
}

pub async fn enqueue_json<T: Serialize + Sync>(
    queue: &dyn JobQueue,
    name: &str,
    payload: &T,
    opts: EnqueueOptions,
) -> Result<EnqueueOutcome> {
    let value = serde_json::to_value(payload)?;
    queue.enqueue(name, value, opts).await
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub rate_per_sec: f64,
    pub burst: u32,
    pub attempts: u32,
    pub backoff_ms: u64,
    pub job_timeout_secs: u64,
}

impl QueueSettings {
    /// Payout and key registration call the money-moving banking API and
    /// stay far below webhook throughput.
    pub fn defaults_for(queue: &str) -> Self {
        match queue {
            WEBHOOK_QUEUE => Self {
                concurrency: 10,
                rate_per_sec: 50.0,
                burst: 50,
                attempts: 5,
                backoff_ms: 2_000,
                job_timeout_secs: 60,
            },
            PAYOUT_QUEUE => Self {
                concurrency: 2,
                rate_per_sec: 0.5,
                burst: 1,
                attempts: 5,
                backoff_ms: 30_000,
                job_timeout_secs: 90,
            },
            PIX_KEY_REGISTRATION_QUEUE => Self {
                concurrency: 1,
                rate_per_sec: 0.2,
                burst: 1,
                attempts: 3,
                backoff_ms: 60_000,
                job_timeout_secs: 90,
            },
            RECEIPT_QUEUE => Self {
                concurrency: 5,
                rate_per_sec: 10.0,
                burst: 10,
                attempts: 5,
                backoff_ms: 5_000,
                job_timeout_secs: 120,
            },
            _ => Self {
                concurrency: 4,
                rate_per_sec: 5.0,
                burst: 5,
                attempts: 3,
                backoff_ms: 5_000,
                job_timeout_secs: 60,
            },
        }
    }
}
