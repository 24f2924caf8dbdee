use crate::domain::charge::ChargeKind;
use crate::domain::event::StandardPaymentEvent;
use crate::domain::jobs::{PayoutJob, ReceiptJob};
use crate::queue::{enqueue_json, EnqueueOptions, EnqueueOutcome, JobQueue, PAYOUT_QUEUE, RECEIPT_QUEUE};
use crate::repo::ChargeStore;
use crate::webhook::router::{claim_payment, PaymentClaim, PaymentContextHandler};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

pub fn payout_dedup_key(charge_id: uuid::Uuid) -> String {
    format!("payout:{}", charge_id)
}

pub fn receipt_dedup_key(charge_id: uuid::Uuid) -> String {
    format!("receipt:{}", charge_id)
}

#[derive(Clone)]
pub struct PassengerChargeHandler {
    pub charges: Arc<dyn ChargeStore>,
    pub queue: Arc<dyn JobQueue>,
}

impl PassengerChargeHandler {
    /// Side effects never undo PAID; a missed payout enqueue is picked up
    /// by the payout retry job.
    async fn enqueue_effect<T: Serialize + Sync>(&self, queue: &str, payload: &T, dedup: String) {
        let opts = EnqueueOptions::for_queue(queue).dedup(dedup.clone());
        match enqueue_json(self.queue.as_ref(), queue, payload, opts).await {
            Ok(EnqueueOutcome::Enqueued(id)) => tracing::debug!("queued {} job {} ({})", queue, id, dedup),
            Ok(EnqueueOutcome::Duplicate) => tracing::debug!("{} job {} already queued", queue, dedup),
            Err(e) => tracing::error!("failed to queue {} job {}: {:#}", queue, dedup, e),
        }
    }
}

#[async_trait::async_trait]
impl PaymentContextHandler for PassengerChargeHandler {
    fn name(&self) -> &'static str {
        "passenger_charge"
    }

    async fn try_handle(&self, event: &StandardPaymentEvent) -> Result<bool> {
        let charge = match claim_payment(self.charges.as_ref(), ChargeKind::PassengerCharge, event).await? {
            PaymentClaim::NotFound => return Ok(false),
            PaymentClaim::AlreadySettled(_) => return Ok(true),
            PaymentClaim::JustPaid(charge) => charge,
        };

        tracing::info!(
            "passenger charge {} paid ({} centavos), driver {}",
            charge.id,
            charge.collected_minor(),
            charge.user_id
        );

        let payout = PayoutJob {
            charge_id: charge.id,
            gross_amount_minor: charge.collected_minor(),
        };
        self.enqueue_effect(PAYOUT_QUEUE, &payout, payout_dedup_key(charge.id)).await;

        let receipt = ReceiptJob {
            charge_id: charge.id,
            driver_id: charge.user_id,
            passenger_id: charge.passenger_id,
            amount_minor: charge.collected_minor(),
            paid_at: charge.paid_at.unwrap_or(event.paid_at),
            end_to_end_id: event.end_to_end_id.clone(),
        };
        self.enqueue_effect(RECEIPT_QUEUE, &receipt, receipt_dedup_key(charge.id)).await;

        Ok(true)
    }
}
