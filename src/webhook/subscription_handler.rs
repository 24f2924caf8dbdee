use crate::domain::charge::{ChargeKind, ChargeStatus};
use crate::domain::event::StandardPaymentEvent;
use crate::repo::{ChargeStore, SubscriptionActivator};
use crate::webhook::router::{claim_payment, PaymentClaim, PaymentContextHandler};
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct SubscriptionPaymentHandler {
    pub charges: Arc<dyn ChargeStore>,
    pub activator: Arc<dyn SubscriptionActivator>,
}

#[async_trait::async_trait]
impl PaymentContextHandler for SubscriptionPaymentHandler {
    fn name(&self) -> &'static str {
        "subscription_invoice"
    }

    async fn try_handle(&self, event: &StandardPaymentEvent) -> Result<bool> {
        match claim_payment(self.charges.as_ref(), ChargeKind::SubscriptionInvoice, event).await? {
            PaymentClaim::NotFound => Ok(false),
            // Activation is idempotent, so a redelivery or reconciliation
            // finishes one that failed after the invoice went PAID.
            PaymentClaim::AlreadySettled(invoice) if invoice.status == ChargeStatus::Paid => {
                self.activator.activate(&invoice).await?;
                Ok(true)
            }
            PaymentClaim::AlreadySettled(_) => Ok(true),
            PaymentClaim::JustPaid(invoice) => {
                tracing::info!(
                    "subscription invoice {} paid ({} centavos)",
                    invoice.id,
                    invoice.collected_minor()
                );
                // PAID stays committed; the error sends the job back for retry.
                if let Err(e) = self.activator.activate(&invoice).await {
                    tracing::error!("subscription activation for invoice {} failed: {:#}", invoice.id, e);
                    return Err(e);
                }
                Ok(true)
            }
        }
    }
}
