use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeKind {
    SubscriptionInvoice,
    PassengerCharge,
}

impl ChargeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeKind::SubscriptionInvoice => "SUBSCRIPTION_INVOICE",
            ChargeKind::PassengerCharge => "PASSENGER_CHARGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Pending,
    Paid,
    Cancelled,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "PENDING",
            ChargeStatus::Paid => "PAID",
            ChargeStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PAID" => ChargeStatus::Paid,
            "CANCELLED" => ChargeStatus::Cancelled,
            _ => ChargeStatus::Pending,
        }
    }

    /// PAID and CANCELLED never move again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Transferred,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Processing => "PROCESSING",
            PayoutStatus::Transferred => "TRANSFERRED",
            PayoutStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PROCESSING" => PayoutStatus::Processing,
            "TRANSFERRED" => PayoutStatus::Transferred,
            "FAILED" => PayoutStatus::Failed,
            _ => PayoutStatus::Pending,
        }
    }
}

/// Fee lookup input: PIX paid on the spot vs. a scheduled (due-date) charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    Instant,
    Scheduled,
}

impl ChargeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeType::Instant => "INSTANT",
            ChargeType::Scheduled => "SCHEDULED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "SCHEDULED" => ChargeType::Scheduled,
            _ => ChargeType::Instant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: Uuid,
    pub kind: ChargeKind,
    pub user_id: Uuid,
    pub passenger_id: Option<Uuid>,
    pub amount_minor: i64,
    pub due_date: chrono::NaiveDate,
    pub status: ChargeStatus,
    pub gateway_transaction_id: String,
    pub charge_type: ChargeType,
    pub paid_amount_minor: Option<i64>,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub payout_status: PayoutStatus,
}

impl Charge {
    /// Amount the payer actually settled, falling back to the billed amount.
    pub fn collected_minor(&self) -> i64 {
        self.paid_amount_minor.unwrap_or(self.amount_minor)
    }
}

#[derive(Debug, Clone)]
pub struct PaidUpdate {
    pub paid_amount_minor: i64,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub end_to_end_id: Option<String>,
}
