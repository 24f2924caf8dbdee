use crate::domain::jobs::JobReport;
use crate::error::PipelineError;
use crate::gateways::ProviderTransferState;
use crate::jobs::{JobContext, BATCH_LIMIT};
use anyhow::Result;
use chrono::{Duration, Utc};

pub const JOB_NAME: &str = "key-validation-poller";

/// Resolves IN_PROGRESS key validations. Rows older than the window stay
/// IN_PROGRESS for manual review.
pub async fn run(ctx: &JobContext, window_hours: i64) -> Result<JobReport> {
    let mut report = JobReport::new(JOB_NAME);
    let now = Utc::now();
    let open = ctx
        .validations
        .list_in_progress(now - Duration::hours(window_hours), now, BATCH_LIMIT)
        .await?;

    for validation in open {
        report.processed += 1;
        let timeout = ctx.settings.provider_timeout;
        let upstream = match tokio::time::timeout(
            timeout,
            ctx.provider.query_transfer(&validation.provider_reference),
        )
        .await
        {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => {
                report.record_error(validation.id, &e);
                continue;
            }
            Err(_) => {
                let e = anyhow::Error::from(PipelineError::ProviderTimeout(timeout));
                report.record_error(validation.id, &e);
                continue;
            }
        };

        let applied = match upstream.state {
            ProviderTransferState::Completed => ctx.key_validation.confirm(&validation).await,
            ProviderTransferState::Failed(reason) => ctx.key_validation.reject(&validation, &reason).await,
            ProviderTransferState::InFlight | ProviderTransferState::NotFound => {
                report.skipped += 1;
                continue;
            }
        };

        match applied {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                tracing::error!("resolving key validation {} failed: {:#}", validation.id, e);
                report.record_error(validation.id, &e);
            }
        }
    }

    tracing::info!(
        "{}: processed={} resolved={} pending={} failed={}",
        JOB_NAME,
        report.processed,
        report.succeeded,
        report.skipped,
        report.failed
    );
    Ok(report)
}
