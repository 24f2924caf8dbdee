use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Processing,
    Success,
    Error,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Success => "SUCCESS",
            TransferStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => TransferStatus::Success,
            "ERROR" => TransferStatus::Error,
            _ => TransferStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub charge_id: Uuid,
    pub driver_id: Uuid,
    pub amount_minor: i64,
    pub fee_minor: i64,
    pub status: TransferStatus,
    /// Sent with every submission of this transfer. Carried over from an
    /// ERROR predecessor whose upstream outcome was never confirmed.
    pub idempotency_key: String,
    pub provider_transfer_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransferRecord {
    /// Provider id once known, otherwise the idempotency key.
    pub fn provider_reference(&self) -> String {
        self.provider_transfer_id
            .clone()
            .unwrap_or_else(|| self.idempotency_key.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub charge_id: Uuid,
    pub driver_id: Uuid,
    pub amount_minor: i64,
    pub fee_minor: i64,
    /// `None` keys the transfer by its own id.
    pub idempotency_key: Option<String>,
}
