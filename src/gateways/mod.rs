use crate::config::AppConfig;
use crate::domain::charge::ChargeType;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod fees;
pub mod inter;
pub mod mock;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub txid: String,
    pub amount_minor: i64,
    pub charge_type: ChargeType,
    pub due_date: Option<chrono::NaiveDate>,
    pub payer_name: Option<String>,
    pub payer_document: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderChargeStatus {
    Active,
    Paid,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCharge {
    pub txid: String,
    pub status: ProviderChargeStatus,
    pub pix_copy_paste: Option<String>,
    pub end_to_end_id: Option<String>,
    pub paid_amount_minor: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Our transfer id; the provider deduplicates retried submissions on it.
    pub idempotency_key: String,
    pub pix_key: String,
    pub amount_minor: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderTransferState {
    Completed,
    InFlight,
    Failed(String),
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTransfer {
    pub provider_transfer_id: Option<String>,
    pub state: ProviderTransferState,
}

/// One gateway behind a uniform contract. Implementations own their wire
/// format; everything upstream only sees these types.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_charge(&self, request: ChargeRequest) -> Result<ProviderCharge>;

    async fn query_charge(&self, txid: &str) -> Result<ProviderCharge>;

    async fn create_transfer(&self, request: TransferRequest) -> Result<ProviderTransfer>;

    /// `reference` is the provider transfer id when known, otherwise the
    /// idempotency key the transfer was submitted with.
    async fn query_transfer(&self, reference: &str) -> Result<ProviderTransfer>;

    /// Raw payment items confirmed in the window, in the same shape the
    /// gateway posts to the webhook.
    async fn list_recent_payments(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        until: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<serde_json::Value>>;

    fn fee(&self, amount_minor: i64, charge_type: ChargeType) -> i64;
}

/// Resolves the active gateway once at start-up.
pub fn provider_from_config(cfg: &AppConfig) -> Result<Arc<dyn PaymentProvider>> {
    match cfg.payment_gateway.as_str() {
        "inter" => Ok(Arc::new(inter::InterProvider {
            base_url: cfg.inter_base_url.clone(),
            access_token: cfg.inter_access_token.clone(),
            account: cfg.inter_account.clone(),
            pix_key: cfg.inter_pix_key.clone(),
            timeout_ms: cfg.provider_timeout_ms,
            fees: fees::FeeSchedule::inter_default(),
            client: reqwest::Client::new(),
        })),
        "mock" => Ok(Arc::new(mock::MockProvider::new(mock::MockBehavior::AlwaysSuccess))),
        other => Err(crate::error::PipelineError::UnknownGateway(other.to_string()).into()),
    }
}
