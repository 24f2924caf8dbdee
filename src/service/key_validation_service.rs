use crate::domain::driver::{KeyValidationStatus, PixKeyStatus, PixKeyValidation};
use crate::domain::jobs::KeyRegistrationJob;
use crate::error::PipelineError;
use crate::gateways::{PaymentProvider, ProviderTransferState, TransferRequest};
use crate::queue::worker::JobHandler;
use crate::queue::Job;
use crate::repo::{DriverStore, KeyValidationStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One centavo sent to a freshly registered key proves it resolves to an
/// account before any real payout goes there.
pub const VALIDATION_AMOUNT_MINOR: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Skipped(&'static str),
    Confirmed,
    Rejected(String),
    InFlight,
}

#[derive(Clone)]
pub struct KeyValidationService {
    pub drivers: Arc<dyn DriverStore>,
    pub validations: Arc<dyn KeyValidationStore>,
    pub provider: Arc<dyn PaymentProvider>,
    pub provider_timeout: Duration,
}

impl KeyValidationService {
    pub async fn start_validation(&self, driver_id: Uuid) -> Result<RegistrationOutcome> {
        let Some(profile) = self.drivers.payout_profile(driver_id).await? else {
            tracing::warn!("key registration for unknown driver {}", driver_id);
            return Ok(RegistrationOutcome::Skipped("driver not found"));
        };
        if profile.pix_key_status == PixKeyStatus::Validated {
            return Ok(RegistrationOutcome::Skipped("key already validated"));
        }
        let Some(pix_key) = profile.pix_key.filter(|k| !k.trim().is_empty()) else {
            return Ok(RegistrationOutcome::Skipped("driver has no pix key"));
        };

        // A retried job resends under the reference it already recorded.
        let validation = match self.validations.open_for_driver(driver_id).await? {
            Some(open) if open.pix_key == pix_key => open,
            _ => {
                let id = Uuid::new_v4();
                let v = PixKeyValidation {
                    id,
                    driver_id,
                    pix_key: pix_key.clone(),
                    provider_reference: format!("kv{}", id.simple()),
                    status: KeyValidationStatus::InProgress,
                    created_at: chrono::Utc::now(),
                };
                self.validations.create(&v).await?;
                v
            }
        };

        self.drivers
            .set_pix_key_status(
                driver_id,
                &[PixKeyStatus::NotRegistered, PixKeyStatus::Invalidated],
                PixKeyStatus::Pending,
                None,
            )
            .await?;

        let request = TransferRequest {
            idempotency_key: validation.provider_reference.clone(),
            pix_key,
            amount_minor: VALIDATION_AMOUNT_MINOR,
            description: "Validacao de chave PIX".to_string(),
        };
        let resp = match tokio::time::timeout(self.provider_timeout, self.provider.create_transfer(request)).await {
            Ok(r) => r?,
            Err(_) => return Err(PipelineError::ProviderTimeout(self.provider_timeout).into()),
        };

        match resp.state {
            ProviderTransferState::Completed => {
                self.confirm(&validation).await?;
                Ok(RegistrationOutcome::Confirmed)
            }
            ProviderTransferState::Failed(reason) => {
                self.reject(&validation, &reason).await?;
                Ok(RegistrationOutcome::Rejected(reason))
            }
            ProviderTransferState::InFlight | ProviderTransferState::NotFound => {
                tracing::info!("key validation {} for driver {} in flight", validation.id, driver_id);
                Ok(RegistrationOutcome::InFlight)
            }
        }
    }

    pub async fn confirm(&self, validation: &PixKeyValidation) -> Result<()> {
        self.validations
            .resolve(validation.id, KeyValidationStatus::Confirmed)
            .await?;
        if self
            .drivers
            .set_pix_key_status(
                validation.driver_id,
                &[PixKeyStatus::Pending, PixKeyStatus::NotRegistered],
                PixKeyStatus::Validated,
                None,
            )
            .await?
        {
            tracing::info!("pix key of driver {} validated", validation.driver_id);
        }
        Ok(())
    }

    pub async fn reject(&self, validation: &PixKeyValidation, reason: &str) -> Result<()> {
        self.validations
            .resolve(validation.id, KeyValidationStatus::Rejected)
            .await?;
        self.drivers
            .set_pix_key_status(
                validation.driver_id,
                &[PixKeyStatus::Pending, PixKeyStatus::NotRegistered],
                PixKeyStatus::Invalidated,
                Some(reason),
            )
            .await?;
        tracing::warn!("pix key of driver {} rejected: {}", validation.driver_id, reason);
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobHandler for KeyValidationService {
    async fn handle(&self, job: &Job) -> Result<()> {
        let req: KeyRegistrationJob = match job.payload_as() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("key registration job {} has an unreadable payload, discarded: {}", job.id, e);
                return Ok(());
            }
        };
        let outcome = self.start_validation(req.driver_id).await?;
        tracing::debug!("key registration for driver {}: {:?}", req.driver_id, outcome);
        Ok(())
    }
}
