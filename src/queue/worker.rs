use crate::queue::token_bucket::TokenBucket;
use crate::queue::{FailOutcome, Job, JobQueue, QueueSettings};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    /// `Err` hands the job back to the queue's retry/backoff policy.
    async fn handle(&self, job: &Job) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retrying,
    Dead,
}

pub struct QueueWorker {
    pub queue_name: String,
    pub queue: Arc<dyn JobQueue>,
    pub handler: Arc<dyn JobHandler>,
    pub settings: QueueSettings,
    pub poll_interval: Duration,
}

impl QueueWorker {
    pub fn new(
        queue_name: &str,
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            queue,
            handler,
            settings,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub async fn run(self) {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let bucket = TokenBucket::new(self.settings.burst, self.settings.rate_per_sec);
        let job_timeout = Duration::from_secs(self.settings.job_timeout_secs);
        let mut last_reap = tokio::time::Instant::now();

        tracing::info!(
            "worker queue={} concurrency={} rate_per_sec={}",
            self.queue_name,
            self.settings.concurrency,
            self.settings.rate_per_sec
        );

        loop {
            if last_reap.elapsed() > job_timeout {
                match self.queue.requeue_stalled(&self.queue_name, job_timeout * 2).await {
                    Ok(n) if n > 0 => tracing::warn!("queue={} requeued {} stalled jobs", self.queue_name, n),
                    Ok(_) => {}
                    Err(e) => tracing::error!("queue={} stalled-job sweep failed: {}", self.queue_name, e),
                }
                last_reap = tokio::time::Instant::now();
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            let job = match self.queue.dequeue(&self.queue_name).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!("queue={} dequeue error: {}", self.queue_name, e);
                    tokio::time::sleep(self.poll_interval * 4).await;
                    continue;
                }
            };

            bucket.acquire().await;

            let queue = self.queue.clone();
            let handler = self.handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = execute(queue.as_ref(), handler.as_ref(), job, job_timeout).await {
                    tracing::error!("job bookkeeping failed: {}", e);
                }
            });
        }
    }

    /// Dequeues and runs a single job inline.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>> {
        let Some(job) = self.queue.dequeue(&self.queue_name).await? else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(self.settings.job_timeout_secs);
        let outcome = execute(self.queue.as_ref(), self.handler.as_ref(), job, timeout).await?;
        Ok(Some(outcome))
    }
}

async fn execute(
    queue: &dyn JobQueue,
    handler: &dyn JobHandler,
    job: Job,
    timeout: Duration,
) -> Result<JobOutcome> {
    let result = match tokio::time::timeout(timeout, handler.handle(&job)).await {
        Ok(r) => r,
        Err(_) => Err(anyhow::anyhow!("job timed out after {:?}", timeout)),
    };

    match result {
        Ok(()) => {
            queue.complete(&job).await?;
            tracing::debug!("queue={} job={} completed", job.queue, job.id);
            Ok(JobOutcome::Completed)
        }
        Err(e) => {
            let msg = format!("{:#}", e);
            match queue.fail(&job, &msg).await? {
                FailOutcome::Retrying { run_at } => {
                    tracing::warn!(
                        "queue={} job={} attempt {}/{} failed, retry at {}: {}",
                        job.queue,
                        job.id,
                        job.attempts_made,
                        job.max_attempts,
                        run_at,
                        msg
                    );
                    Ok(JobOutcome::Retrying)
                }
                FailOutcome::Dead => {
                    tracing::error!(
                        "queue={} job={} exhausted {} attempts, kept in dead set: {}",
                        job.queue,
                        job.id,
                        job.max_attempts,
                        msg
                    );
                    Ok(JobOutcome::Dead)
                }
            }
        }
    }
}
