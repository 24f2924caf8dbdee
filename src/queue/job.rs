use crate::queue::FailOutcome;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_BACKOFF_MS: u64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Ready,
    Delayed,
    Active,
    Completed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub queue: String,
    pub payload: serde_json::Value,
    pub dedup_key: Option<String>,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub run_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        queue: &str,
        payload: serde_json::Value,
        dedup_key: Option<String>,
        max_attempts: u32,
        backoff_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.to_string(),
            payload,
            dedup_key,
            state: JobState::Ready,
            attempts_made: 0,
            max_attempts: max_attempts.max(1),
            backoff_ms,
            last_error: None,
            created_at: Utc::now(),
            started_at: None,
            run_at: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.state = JobState::Active;
        self.attempts_made += 1;
        self.started_at = Some(now);
        self.run_at = None;
    }

    /// True while the running attempt is the last one the budget allows.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    /// `backoff * 2^(attempts_made - 1)`, capped at one hour.
    pub fn backoff_delay(&self) -> chrono::Duration {
        let exp = self.attempts_made.saturating_sub(1).min(20);
        let ms = self
            .backoff_ms
            .saturating_mul(1_u64 << exp)
            .min(MAX_BACKOFF_MS);
        chrono::Duration::milliseconds(ms as i64)
    }

    /// Retry after backoff while the budget lasts, otherwise the dead set.
    pub fn next_after_failure(&self, now: DateTime<Utc>) -> FailOutcome {
        if self.can_retry() {
            FailOutcome::Retrying {
                run_at: now + self.backoff_delay(),
            }
        } else {
            FailOutcome::Dead
        }
    }

    /// Claimed before `cutoff` and never finished.
    pub fn stalled_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.started_at.map(|s| s < cutoff).unwrap_or(true)
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
