use crate::domain::charge::{Charge, ChargeKind, ChargeStatus, PayoutStatus};
use crate::domain::driver::PixKeyStatus;
use crate::domain::jobs::PayoutJob;
use crate::domain::transfer::{NewTransfer, TransferRecord, TransferStatus};
use crate::error::PipelineError;
use crate::gateways::{PaymentProvider, ProviderTransfer, ProviderTransferState, TransferRequest};
use crate::queue::worker::JobHandler;
use crate::queue::Job;
use crate::repo::{ChargeStore, DriverStore, TransferStore};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutAttempt {
    Skipped(&'static str),
    Transferred,
    /// Accepted upstream, settlement left to the status poller.
    InFlight,
    /// Permanent failure; payout FAILED, nothing for the queue to retry.
    Failed(String),
}

#[derive(Clone)]
pub struct PayoutService {
    pub charges: Arc<dyn ChargeStore>,
    pub transfers: Arc<dyn TransferStore>,
    pub drivers: Arc<dyn DriverStore>,
    pub provider: Arc<dyn PaymentProvider>,
    pub provider_timeout: Duration,
}

impl PayoutService {
    /// Moves the driver's share of one PAID passenger charge. Safe to call
    /// any number of times for the same charge: an open transfer is reused
    /// with its original idempotency key.
    pub async fn attempt(&self, charge_id: Uuid, final_attempt: bool) -> Result<PayoutAttempt> {
        let Some(charge) = self.charges.get(ChargeKind::PassengerCharge, charge_id).await? else {
            tracing::warn!("payout requested for unknown charge {}", charge_id);
            return Ok(PayoutAttempt::Skipped("charge not found"));
        };
        if charge.status != ChargeStatus::Paid {
            return Ok(PayoutAttempt::Skipped("charge not paid"));
        }
        if charge.payout_status == PayoutStatus::Transferred {
            return Ok(PayoutAttempt::Skipped("already transferred"));
        }

        let history = self.transfers.list_for_charge(charge.id).await?;
        if history.iter().any(|t| t.status == TransferStatus::Success) {
            self.charges
                .set_payout_status(
                    charge.id,
                    &[PayoutStatus::Pending, PayoutStatus::Processing, PayoutStatus::Failed],
                    PayoutStatus::Transferred,
                )
                .await?;
            return Ok(PayoutAttempt::Transferred);
        }

        let profile = self.drivers.payout_profile(charge.user_id).await?;
        let Some(pix_key) = profile
            .as_ref()
            .and_then(|p| p.payout_destination())
            .map(str::to_string)
        else {
            tracing::warn!(
                "charge {}: driver {} has no validated pix key, payout failed",
                charge.id,
                charge.user_id
            );
            self.mark_payout_failed(charge.id).await?;
            return Ok(PayoutAttempt::Failed("driver has no validated pix key".to_string()));
        };

        let gross = charge.collected_minor();
        let fee = self.provider.fee(gross, charge.charge_type);
        let net = gross - fee;
        if net <= 0 {
            tracing::warn!("charge {}: net payout {} after fee {} is not positive", charge.id, net, fee);
            self.mark_payout_failed(charge.id).await?;
            return Ok(PayoutAttempt::Failed(format!(
                "net amount {} not positive after fee {}",
                net, fee
            )));
        }

        let has_open = history.iter().any(|t| t.status == TransferStatus::Processing);
        let carried = if has_open {
            None
        } else {
            self.unresolved_predecessor(&history).await?
        };

        let transfer = self
            .transfers
            .open_or_create(&NewTransfer {
                charge_id: charge.id,
                driver_id: charge.user_id,
                amount_minor: net,
                fee_minor: fee,
                idempotency_key: carried.as_ref().map(|(key, _)| key.clone()),
            })
            .await?;
        self.charges
            .set_payout_status(
                charge.id,
                &[PayoutStatus::Pending, PayoutStatus::Failed],
                PayoutStatus::Processing,
            )
            .await?;

        // The predecessor's submission landed after all: settle from the
        // provider's record instead of submitting again.
        if let Some((_, upstream)) = carried {
            if matches!(
                upstream.state,
                ProviderTransferState::Completed | ProviderTransferState::InFlight
            ) {
                tracing::warn!(
                    "charge {}: earlier transfer under key {} found upstream as {:?}, reconciling",
                    charge.id,
                    transfer.idempotency_key,
                    upstream.state
                );
                return self.apply_submission(&transfer, upstream).await;
            }
        }

        let request = TransferRequest {
            idempotency_key: transfer.idempotency_key.clone(),
            pix_key,
            amount_minor: transfer.amount_minor,
            description: describe(&charge),
        };

        match self.send(request).await {
            Ok(resp) => self.apply_submission(&transfer, resp).await,
            Err(e) => {
                if final_attempt {
                    tracing::error!(
                        "charge {}: transfer {} failed on final attempt: {:#}",
                        charge.id,
                        transfer.id,
                        e
                    );
                    self.fail_transfer(&transfer, &format!("{:#}", e), true).await?;
                }
                Err(e)
            }
        }
    }

    async fn send(&self, request: TransferRequest) -> Result<ProviderTransfer> {
        match tokio::time::timeout(self.provider_timeout, self.provider.create_transfer(request)).await {
            Ok(r) => r,
            Err(_) => Err(PipelineError::ProviderTimeout(self.provider_timeout).into()),
        }
    }

    /// Latest ERROR transfer the provider does not report as failed. A
    /// timed-out or never-found submission may still have moved money, so
    /// its key goes with the next transfer and the provider deduplicates.
    /// A lookup error is transient and aborts the attempt.
    async fn unresolved_predecessor(
        &self,
        history: &[TransferRecord],
    ) -> Result<Option<(String, ProviderTransfer)>> {
        let Some(last) = history.iter().rev().find(|t| t.status == TransferStatus::Error) else {
            return Ok(None);
        };
        let reference = last.provider_reference();
        let upstream = match tokio::time::timeout(self.provider_timeout, self.provider.query_transfer(&reference)).await {
            Ok(r) => r?,
            Err(_) => return Err(PipelineError::ProviderTimeout(self.provider_timeout).into()),
        };
        match upstream.state {
            ProviderTransferState::Failed(_) => Ok(None),
            _ => Ok(Some((last.idempotency_key.clone(), upstream))),
        }
    }

    async fn apply_submission(&self, transfer: &TransferRecord, resp: ProviderTransfer) -> Result<PayoutAttempt> {
        match resp.state {
            ProviderTransferState::Completed => {
                self.complete_transfer(transfer, resp.provider_transfer_id.as_deref())
                    .await?;
                Ok(PayoutAttempt::Transferred)
            }
            ProviderTransferState::InFlight => {
                if let Some(id) = resp.provider_transfer_id.as_deref() {
                    self.transfers.set_provider_id(transfer.id, id).await?;
                }
                tracing::info!("transfer {} accepted, awaiting settlement", transfer.id);
                Ok(PayoutAttempt::InFlight)
            }
            ProviderTransferState::Failed(reason) => {
                self.fail_transfer(transfer, &reason, true).await?;
                Ok(PayoutAttempt::Failed(reason))
            }
            ProviderTransferState::NotFound => Err(anyhow!(
                "provider returned no transfer for submission {}",
                transfer.id
            )),
        }
    }

    /// PROCESSING -> SUCCESS and payout TRANSFERRED. The charge only moves
    /// when the row is SUCCESS afterwards.
    pub async fn complete_transfer(&self, transfer: &TransferRecord, provider_id: Option<&str>) -> Result<()> {
        if self
            .transfers
            .finish(transfer.id, TransferStatus::Success, provider_id, None)
            .await?
        {
            tracing::info!(
                "transfer {} of {} centavos to driver {} settled",
                transfer.id,
                transfer.amount_minor,
                transfer.driver_id
            );
        } else {
            let current = self.transfers.list_for_charge(transfer.charge_id).await?;
            let succeeded = current
                .iter()
                .any(|t| t.id == transfer.id && t.status == TransferStatus::Success);
            if !succeeded {
                tracing::error!(
                    "transfer {} completed upstream but is closed locally; next payout attempt for charge {} reconciles it",
                    transfer.id,
                    transfer.charge_id
                );
                return Ok(());
            }
        }
        self.charges
            .set_payout_status(
                transfer.charge_id,
                &[PayoutStatus::Pending, PayoutStatus::Processing, PayoutStatus::Failed],
                PayoutStatus::Transferred,
            )
            .await?;
        Ok(())
    }

    /// PROCESSING -> ERROR and payout FAILED. `invalidate_key` when the
    /// provider refused the destination so no retry hits the same key
    /// before it is validated again.
    pub async fn fail_transfer(&self, transfer: &TransferRecord, reason: &str, invalidate_key: bool) -> Result<()> {
        self.transfers
            .finish(transfer.id, TransferStatus::Error, None, Some(reason))
            .await?;
        self.mark_payout_failed(transfer.charge_id).await?;
        if invalidate_key
            && self
                .drivers
                .set_pix_key_status(
                    transfer.driver_id,
                    &[PixKeyStatus::Validated, PixKeyStatus::Pending],
                    PixKeyStatus::Invalidated,
                    Some(reason),
                )
                .await?
        {
            tracing::warn!("pix key of driver {} invalidated: {}", transfer.driver_id, reason);
        }
        Ok(())
    }

    async fn mark_payout_failed(&self, charge_id: Uuid) -> Result<()> {
        self.charges
            .set_payout_status(
                charge_id,
                &[PayoutStatus::Pending, PayoutStatus::Processing],
                PayoutStatus::Failed,
            )
            .await?;
        Ok(())
    }
}

fn describe(charge: &Charge) -> String {
    format!("Repasse cobranca {} venc {}", charge.id.simple(), charge.due_date)
}

#[async_trait::async_trait]
impl JobHandler for PayoutService {
    async fn handle(&self, job: &Job) -> Result<()> {
        let payout: PayoutJob = match job.payload_as() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("payout job {} has an unreadable payload, discarded: {}", job.id, e);
                return Ok(());
            }
        };
        let outcome = self.attempt(payout.charge_id, job.is_final_attempt()).await?;
        tracing::debug!("payout job {} for charge {}: {:?}", job.id, payout.charge_id, outcome);
        Ok(())
    }
}
