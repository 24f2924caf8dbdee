use crate::domain::jobs::JobReport;
use crate::jobs::{
    key_validation_poller, payout_retry, payout_status_poller, webhook_reconciliation, JobContext,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    PayoutRetry,
    PayoutStatusPoller,
    KeyValidationPoller,
    WebhookReconciliation,
}

impl JobName {
    pub const ALL: [JobName; 4] = [
        JobName::KeyValidationPoller,
        JobName::PayoutRetry,
        JobName::PayoutStatusPoller,
        JobName::WebhookReconciliation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::PayoutRetry => payout_retry::JOB_NAME,
            JobName::PayoutStatusPoller => payout_status_poller::JOB_NAME,
            JobName::KeyValidationPoller => key_validation_poller::JOB_NAME,
            JobName::WebhookReconciliation => webhook_reconciliation::JOB_NAME,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == raw)
    }

    pub fn cadence(&self) -> Duration {
        match self {
            JobName::PayoutRetry => Duration::from_secs(5 * 60),
            JobName::PayoutStatusPoller => Duration::from_secs(10 * 60),
            JobName::KeyValidationPoller => Duration::from_secs(2 * 60),
            JobName::WebhookReconciliation => Duration::from_secs(60 * 60),
        }
    }

    /// Index of the cadence window `now` falls in.
    pub fn slot(&self, now: DateTime<Utc>) -> i64 {
        let secs = self.cadence().as_secs().max(1) as i64;
        now.timestamp().div_euclid(secs)
    }
}

/// Claims a job's time slot at most once across every scheduler replica and
/// manual trigger.
#[async_trait::async_trait]
pub trait SlotLedger: Send + Sync {
    async fn claim(&self, job: JobName, slot: i64, ttl: Duration) -> Result<bool>;
}

#[derive(Clone)]
pub struct RedisSlotLedger {
    pub client: redis::Client,
    pub key_prefix: String,
}

impl RedisSlotLedger {
    pub fn new(redis_url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            key_prefix: "pix:jobs:slot".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SlotLedger for RedisSlotLedger {
    async fn claim(&self, job: JobName, slot: i64, ttl: Duration) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}:{}:{}", self.key_prefix, job.as_str(), slot);
        let set: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(Utc::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobOverrides {
    #[serde(default)]
    pub force: bool,
    pub window_hours: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum JobRun {
    Ran(JobReport),
    SlotClaimed,
}

/// Runs one job unless its current slot was already claimed. `force` runs
/// it regardless.
pub async fn run_job(
    name: JobName,
    ctx: &JobContext,
    ledger: &dyn SlotLedger,
    overrides: &JobOverrides,
    now: DateTime<Utc>,
) -> Result<JobRun> {
    let claimed = ledger
        .claim(name, name.slot(now), name.cadence() * 2)
        .await?;
    if !claimed && !overrides.force {
        tracing::debug!("{} slot {} already claimed", name.as_str(), name.slot(now));
        return Ok(JobRun::SlotClaimed);
    }

    let window = overrides.window_hours.filter(|h| *h > 0);
    let report = match name {
        JobName::PayoutRetry => payout_retry::run(ctx).await?,
        JobName::PayoutStatusPoller => {
            payout_status_poller::run(ctx, window.unwrap_or(ctx.settings.payout_lookback_hours)).await?
        }
        JobName::KeyValidationPoller => {
            key_validation_poller::run(ctx, window.unwrap_or(ctx.settings.key_validation_window_hours))
                .await?
        }
        JobName::WebhookReconciliation => {
            webhook_reconciliation::run(ctx, window.unwrap_or(ctx.settings.reconciliation_window_hours))
                .await?
        }
    };
    Ok(JobRun::Ran(report))
}
