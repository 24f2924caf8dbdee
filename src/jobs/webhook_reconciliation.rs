use crate::domain::jobs::JobReport;
use crate::jobs::JobContext;
use crate::webhook::translate::translate;
use anyhow::Result;
use chrono::{Duration, Utc};

pub const JOB_NAME: &str = "webhook-reconciliation";

/// Replays the provider's own payment listing through the router to catch
/// webhooks that never arrived. Already-PAID charges are no-ops, so a fully
/// processed window writes nothing.
pub async fn run(ctx: &JobContext, window_hours: i64) -> Result<JobReport> {
    let mut report = JobReport::new(JOB_NAME);
    let until = Utc::now();
    let since = until - Duration::hours(window_hours);

    let payments = match tokio::time::timeout(
        ctx.settings.provider_timeout,
        ctx.provider.list_recent_payments(since, until),
    )
    .await
    {
        Ok(r) => r?,
        Err(_) => {
            return Err(crate::error::PipelineError::ProviderTimeout(ctx.settings.provider_timeout).into())
        }
    };

    for raw in payments {
        report.processed += 1;
        let event = match translate(ctx.provider.name(), &raw) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!("reconciliation item skipped: {:#}", e);
                report.record_error(raw.get("txid").cloned().unwrap_or_default(), &e);
                continue;
            }
        };

        match ctx.router.route(&event).await {
            Ok(true) => report.succeeded += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                tracing::error!("reconciliation of {} failed: {:#}", event.dedup_key(), e);
                report.record_error(event.dedup_key(), &e);
            }
        }
    }

    tracing::info!(
        "{}: window={}h processed={} handled={} unmatched={} failed={}",
        JOB_NAME,
        window_hours,
        report.processed,
        report.succeeded,
        report.skipped,
        report.failed
    );
    Ok(report)
}
