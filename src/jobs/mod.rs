use crate::config::AppConfig;
use crate::gateways::PaymentProvider;
use crate::repo::{ChargeStore, KeyValidationStore, TransferStore};
use crate::service::key_validation_service::KeyValidationService;
use crate::service::payout_service::PayoutService;
use crate::webhook::router::WebhookRouter;
use std::sync::Arc;
use std::time::Duration;

pub mod key_validation_poller;
pub mod payout_retry;
pub mod payout_status_poller;
pub mod schedule;
pub mod webhook_reconciliation;

/// Batch size for one job run; the next slot picks up the rest.
pub const BATCH_LIMIT: i64 = 200;

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub reconciliation_window_hours: i64,
    pub payout_lookback_hours: i64,
    pub payout_min_age_minutes: i64,
    pub key_validation_window_hours: i64,
    /// PROCESSING transfers the provider has never heard of are given up
    /// after this long.
    pub not_found_grace_minutes: i64,
    pub provider_timeout: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            reconciliation_window_hours: 48,
            payout_lookback_hours: 24,
            payout_min_age_minutes: 5,
            key_validation_window_hours: 24,
            not_found_grace_minutes: 30,
            provider_timeout: Duration::from_millis(15_000),
        }
    }
}

impl JobSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            reconciliation_window_hours: cfg.reconciliation_window_hours,
            payout_lookback_hours: cfg.payout_lookback_hours,
            payout_min_age_minutes: cfg.payout_min_age_minutes,
            key_validation_window_hours: cfg.key_validation_window_hours,
            provider_timeout: Duration::from_millis(cfg.provider_timeout_ms),
            ..Self::default()
        }
    }
}

/// Everything the monitoring jobs touch, shared by the scheduler binary and
/// the `/jobs` trigger endpoint.
#[derive(Clone)]
pub struct JobContext {
    pub charges: Arc<dyn ChargeStore>,
    pub transfers: Arc<dyn TransferStore>,
    pub validations: Arc<dyn KeyValidationStore>,
    pub provider: Arc<dyn PaymentProvider>,
    pub router: Arc<WebhookRouter>,
    pub payouts: Arc<PayoutService>,
    pub key_validation: Arc<KeyValidationService>,
    pub settings: JobSettings,
}
