use serde::{Deserialize, Serialize};

/// Gateway-neutral view of one confirmed PIX payment. This is the webhook
/// queue payload and the Router's input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardPaymentEvent {
    pub gateway_transaction_id: String,
    pub end_to_end_id: Option<String>,
    pub amount_minor: i64,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub gateway: String,
    pub raw: serde_json::Value,
}

impl StandardPaymentEvent {
    pub fn dedup_key(&self) -> String {
        if !self.gateway_transaction_id.is_empty() {
            return self.gateway_transaction_id.clone();
        }
        self.end_to_end_id.clone().unwrap_or_default()
    }
}
