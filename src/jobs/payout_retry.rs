use crate::domain::jobs::JobReport;
use crate::jobs::{JobContext, BATCH_LIMIT};
use crate::service::payout_service::PayoutAttempt;
use anyhow::{anyhow, Result};

pub const JOB_NAME: &str = "payout-retry";

/// Re-runs the payout for PAID charges left PENDING or FAILED once the
/// driver's key is VALIDATED. Calls the payout service directly because the
/// queue's dedup key for the charge may still be held by a completed job.
pub async fn run(ctx: &JobContext) -> Result<JobReport> {
    let mut report = JobReport::new(JOB_NAME);
    let candidates = ctx.charges.payout_retry_candidates(BATCH_LIMIT).await?;

    for charge in candidates {
        report.processed += 1;
        match ctx.payouts.attempt(charge.id, false).await {
            Ok(PayoutAttempt::Transferred) | Ok(PayoutAttempt::InFlight) => report.succeeded += 1,
            Ok(PayoutAttempt::Skipped(why)) => {
                tracing::debug!("payout retry for charge {} skipped: {}", charge.id, why);
                report.skipped += 1;
            }
            Ok(PayoutAttempt::Failed(reason)) => {
                report.record_error(charge.id, &anyhow!(reason));
            }
            Err(e) => {
                tracing::warn!("payout retry for charge {} failed: {:#}", charge.id, e);
                report.record_error(charge.id, &e);
            }
        }
    }

    tracing::info!(
        "{}: processed={} succeeded={} skipped={} failed={}",
        JOB_NAME,
        report.processed,
        report.succeeded,
        report.skipped,
        report.failed
    );
    Ok(report)
}
