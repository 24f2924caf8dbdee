use crate::error::PipelineError;
use crate::queue::job::{Job, JobState};
use crate::queue::{EnqueueOptions, EnqueueOutcome, FailOutcome, JobQueue};
use anyhow::Result;
use chrono::Utc;
use redis::AsyncCommands;

const STALLED_ERROR: &str = "worker stopped before finishing the job";

/// Redis layout per queue:
/// `{prefix}:{queue}:job:{id}` job JSON, `:ready` list, `:active` list,
/// `:delayed` and `:dead` sorted sets, `:dedup:{key}` claimed dedup keys.
#[derive(Clone)]
pub struct RedisJobQueue {
    pub client: redis::Client,
    pub key_prefix: String,
    pub completed_retention_secs: u64,
}

impl RedisJobQueue {
    pub fn new(redis_url: &str, completed_retention_secs: u64) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key_prefix: "pix:queue".to_string(),
            completed_retention_secs,
        })
    }

    pub fn key(&self, queue: &str, suffix: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, queue, suffix)
    }

    pub fn job_key(&self, queue: &str, id: &uuid::Uuid) -> String {
        self.key(queue, &format!("job:{}", id))
    }

    pub fn dedup_key(&self, queue: &str, dedup: &str) -> String {
        self.key(queue, &format!("dedup:{}", dedup))
    }

    async fn load(&self, conn: &mut redis::aio::MultiplexedConnection, queue: &str, id: &str) -> Result<Option<Job>> {
        let Ok(id) = id.parse::<uuid::Uuid>() else {
            return Ok(None);
        };
        let raw: Option<String> = conn.get(self.job_key(queue, &id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conn: &mut redis::aio::MultiplexedConnection, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        let key = self.job_key(&job.queue, &job.id);
        if job.state == JobState::Completed {
            let _: () = conn.set_ex(key, payload, self.completed_retention_secs).await?;
        } else {
            let _: () = conn.set(key, payload).await?;
        }
        Ok(())
    }

    async fn try_enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<EnqueueOutcome> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let job = Job::new(queue, payload, opts.dedup_key.clone(), opts.attempts, opts.backoff_ms);

        if let Some(dedup) = &opts.dedup_key {
            let claimed: bool = conn
                .set_nx(self.dedup_key(queue, dedup), job.id.to_string())
                .await?;
            if !claimed {
                tracing::debug!("queue={} dedup_key={} already claimed", queue, dedup);
                return Ok(EnqueueOutcome::Duplicate);
            }
        }

        let stored = async {
            self.save(&mut conn, &job).await?;
            let _: () = conn.lpush(self.key(queue, "ready"), job.id.to_string()).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = stored {
            if let Some(dedup) = &opts.dedup_key {
                let _: redis::RedisResult<usize> = conn.del(self.dedup_key(queue, dedup)).await;
            }
            return Err(e);
        }

        Ok(EnqueueOutcome::Enqueued(job.id))
    }

    /// Dead set plus dedup release, so a fresh delivery can run again.
    async fn bury(&self, conn: &mut redis::aio::MultiplexedConnection, job: &mut Job) -> Result<()> {
        job.state = JobState::Dead;
        self.save(conn, job).await?;
        let _: () = conn
            .zadd(self.key(&job.queue, "dead"), job.id.to_string(), Utc::now().timestamp_millis())
            .await?;
        if let Some(dedup) = &job.dedup_key {
            let _: usize = conn.del(self.dedup_key(&job.queue, dedup)).await?;
        }
        Ok(())
    }

    async fn promote_delayed(&self, conn: &mut redis::aio::MultiplexedConnection, queue: &str) -> Result<()> {
        let delayed = self.key(queue, "delayed");
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = conn.zrangebyscore(&delayed, "-inf", now).await?;
        for id in due {
            // ZREM decides which worker owns the promotion.
            let removed: usize = conn.zrem(&delayed, &id).await?;
            if removed == 1 {
                let _: () = conn.lpush(self.key(queue, "ready"), &id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<EnqueueOutcome> {
        self.try_enqueue(queue, payload, opts)
            .await
            .map_err(|e| PipelineError::QueueUnavailable(e.to_string()).into())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Job>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        self.promote_delayed(&mut conn, queue).await?;

        let id: Option<String> = conn
            .rpoplpush(self.key(queue, "ready"), self.key(queue, "active"))
            .await?;
        let Some(id) = id else {
            return Ok(None);
        };

        match self.load(&mut conn, queue, &id).await? {
            Some(mut job) => {
                job.start(Utc::now());
                self.save(&mut conn, &job).await?;
                Ok(Some(job))
            }
            None => {
                tracing::warn!("queue={} dropping dangling job id {}", queue, id);
                let _: usize = conn.lrem(self.key(queue, "active"), 1, &id).await?;
                Ok(None)
            }
        }
    }

    async fn complete(&self, job: &Job) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut done = job.clone();
        done.state = JobState::Completed;
        done.last_error = None;
        self.save(&mut conn, &done).await?;
        let _: usize = conn
            .lrem(self.key(&job.queue, "active"), 1, job.id.to_string())
            .await?;
        if let Some(dedup) = &job.dedup_key {
            let _: bool = conn
                .expire(self.dedup_key(&job.queue, dedup), self.completed_retention_secs as i64)
                .await?;
        }
        Ok(())
    }

    async fn fail(&self, job: &Job, error: &str) -> Result<FailOutcome> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut failed = job.clone();
        failed.last_error = Some(error.chars().take(1000).collect());
        let _: usize = conn
            .lrem(self.key(&job.queue, "active"), 1, job.id.to_string())
            .await?;

        let outcome = failed.next_after_failure(Utc::now());
        match &outcome {
            FailOutcome::Retrying { run_at } => {
                failed.state = JobState::Delayed;
                failed.run_at = Some(*run_at);
                self.save(&mut conn, &failed).await?;
                let _: () = conn
                    .zadd(self.key(&job.queue, "delayed"), job.id.to_string(), run_at.timestamp_millis())
                    .await?;
            }
            FailOutcome::Dead => self.bury(&mut conn, &mut failed).await?,
        }
        Ok(outcome)
    }

    async fn requeue_stalled(&self, queue: &str, older_than: std::time::Duration) -> Result<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let active = self.key(queue, "active");
        let ids: Vec<String> = conn.lrange(&active, 0, -1).await?;
        let now = Utc::now();
        let cutoff = now - chrono::Duration::from_std(older_than)?;

        let mut moved = 0;
        for id in ids {
            let Some(mut job) = self.load(&mut conn, queue, &id).await? else {
                continue;
            };
            if !job.stalled_since(cutoff) {
                continue;
            }
            let removed: usize = conn.lrem(&active, 1, &id).await?;
            if removed != 1 {
                continue;
            }
            job.last_error = Some(STALLED_ERROR.to_string());
            match job.next_after_failure(now) {
                FailOutcome::Retrying { .. } => {
                    job.state = JobState::Ready;
                    self.save(&mut conn, &job).await?;
                    let _: () = conn.lpush(self.key(queue, "ready"), &id).await?;
                }
                FailOutcome::Dead => {
                    tracing::error!(
                        "queue={} job={} stalled on its last attempt, kept in dead set",
                        queue,
                        job.id
                    );
                    self.bury(&mut conn, &mut job).await?;
                }
            }
            moved += 1;
        }
        Ok(moved)
    }
}
