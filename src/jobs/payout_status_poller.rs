use crate::domain::jobs::JobReport;
use crate::error::PipelineError;
use crate::gateways::{ProviderTransfer, ProviderTransferState};
use crate::jobs::{JobContext, BATCH_LIMIT};
use anyhow::Result;
use chrono::{Duration, Utc};

pub const JOB_NAME: &str = "payout-status-poller";

/// Settles PROCESSING transfers whose submission outcome we never learned:
/// timeouts, in-flight acceptances and crashed workers.
pub async fn run(ctx: &JobContext, lookback_hours: i64) -> Result<JobReport> {
    let mut report = JobReport::new(JOB_NAME);
    let now = Utc::now();
    let open = ctx
        .transfers
        .list_processing(
            now - Duration::hours(lookback_hours),
            now - Duration::minutes(ctx.settings.payout_min_age_minutes),
            BATCH_LIMIT,
        )
        .await?;

    for transfer in open {
        report.processed += 1;
        let reference = transfer.provider_reference();

        let upstream = match query(ctx, &reference).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("status poll for transfer {} failed: {:#}", transfer.id, e);
                report.record_error(transfer.id, &e);
                continue;
            }
        };

        let applied = match upstream.state {
            ProviderTransferState::Completed => {
                ctx.payouts
                    .complete_transfer(&transfer, upstream.provider_transfer_id.as_deref())
                    .await
            }
            ProviderTransferState::Failed(reason) => {
                ctx.payouts.fail_transfer(&transfer, &reason, true).await
            }
            ProviderTransferState::InFlight => {
                report.skipped += 1;
                continue;
            }
            ProviderTransferState::NotFound => {
                let grace = Duration::minutes(ctx.settings.not_found_grace_minutes);
                if transfer.created_at > now - grace {
                    report.skipped += 1;
                    continue;
                }
                tracing::warn!(
                    "transfer {} unknown to provider after {} minutes, marking failed",
                    transfer.id,
                    ctx.settings.not_found_grace_minutes
                );
                // Never reached the provider, so the key is not at fault.
                ctx.payouts
                    .fail_transfer(&transfer, "transfer not found at provider", false)
                    .await
            }
        };

        match applied {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                tracing::error!("settling transfer {} failed: {:#}", transfer.id, e);
                report.record_error(transfer.id, &e);
            }
        }
    }

    tracing::info!(
        "{}: processed={} settled={} waiting={} failed={}",
        JOB_NAME,
        report.processed,
        report.succeeded,
        report.skipped,
        report.failed
    );
    Ok(report)
}

async fn query(ctx: &JobContext, reference: &str) -> Result<ProviderTransfer> {
    let timeout = ctx.settings.provider_timeout;
    match tokio::time::timeout(timeout, ctx.provider.query_transfer(reference)).await {
        Ok(r) => r,
        Err(_) => Err(PipelineError::ProviderTimeout(timeout).into()),
    }
}
