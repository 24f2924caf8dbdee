use crate::domain::charge::{Charge, ChargeKind, ChargeStatus, PaidUpdate};
use crate::domain::event::StandardPaymentEvent;
use crate::queue::worker::JobHandler;
use crate::queue::Job;
use crate::repo::ChargeStore;
use anyhow::Result;
use std::sync::Arc;

/// One charge kind's claim on incoming payments. `Ok(false)` means the
/// event is not this handler's concern.
#[async_trait::async_trait]
pub trait PaymentContextHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_handle(&self, event: &StandardPaymentEvent) -> Result<bool>;
}

#[derive(Debug)]
pub enum PaymentClaim {
    NotFound,
    /// PAID or CANCELLED before this delivery, or a concurrent delivery won
    /// the PENDING -> PAID guard.
    AlreadySettled(Charge),
    JustPaid(Charge),
}

/// Lookup plus status-guarded PENDING -> PAID transition shared by every
/// charge kind.
pub async fn claim_payment(
    charges: &dyn ChargeStore,
    kind: ChargeKind,
    event: &StandardPaymentEvent,
) -> Result<PaymentClaim> {
    if event.gateway_transaction_id.is_empty() {
        return Ok(PaymentClaim::NotFound);
    }
    let Some(charge) = charges
        .find_by_gateway_txid(kind, &event.gateway_transaction_id)
        .await?
    else {
        return Ok(PaymentClaim::NotFound);
    };

    if charge.status.is_terminal() {
        if charge.status == ChargeStatus::Cancelled {
            tracing::warn!(
                "payment {} arrived for cancelled {} {}, left untouched",
                event.gateway_transaction_id,
                kind.as_str(),
                charge.id
            );
        }
        return Ok(PaymentClaim::AlreadySettled(charge));
    }

    if event.amount_minor != charge.amount_minor {
        tracing::warn!(
            "{} {} paid {} but billed {}",
            kind.as_str(),
            charge.id,
            event.amount_minor,
            charge.amount_minor
        );
    }

    let update = PaidUpdate {
        paid_amount_minor: event.amount_minor,
        paid_at: event.paid_at,
        end_to_end_id: event.end_to_end_id.clone(),
    };
    if !charges.mark_paid(kind, charge.id, &update).await? {
        return Ok(PaymentClaim::AlreadySettled(charge));
    }

    let mut paid = charge;
    paid.status = ChargeStatus::Paid;
    paid.paid_amount_minor = Some(update.paid_amount_minor);
    paid.paid_at = Some(update.paid_at);
    Ok(PaymentClaim::JustPaid(paid))
}

#[derive(Clone)]
pub struct WebhookRouter {
    pub handlers: Vec<Arc<dyn PaymentContextHandler>>,
}

impl WebhookRouter {
    pub fn new(handlers: Vec<Arc<dyn PaymentContextHandler>>) -> Self {
        Self { handlers }
    }

    pub async fn route(&self, event: &StandardPaymentEvent) -> Result<bool> {
        for handler in &self.handlers {
            if handler.try_handle(event).await? {
                tracing::debug!("payment {} handled by {}", event.dedup_key(), handler.name());
                return Ok(true);
            }
        }
        tracing::info!(
            "unmatched payment txid={} e2e={:?} amount={} from {}",
            event.gateway_transaction_id,
            event.end_to_end_id,
            event.amount_minor,
            event.gateway
        );
        Ok(false)
    }
}

#[async_trait::async_trait]
impl JobHandler for WebhookRouter {
    async fn handle(&self, job: &Job) -> Result<()> {
        let event: StandardPaymentEvent = match job.payload_as() {
            Ok(ev) => ev,
            Err(e) => {
                tracing::error!("webhook job {} has an unreadable payload, discarded: {}", job.id, e);
                return Ok(());
            }
        };
        self.route(&event).await?;
        Ok(())
    }
}
