use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixKeyStatus {
    NotRegistered,
    Pending,
    Validated,
    Invalidated,
}

impl PixKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixKeyStatus::NotRegistered => "NOT_REGISTERED",
            PixKeyStatus::Pending => "PENDING",
            PixKeyStatus::Validated => "VALIDATED",
            PixKeyStatus::Invalidated => "INVALIDATED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => PixKeyStatus::Pending,
            "VALIDATED" => PixKeyStatus::Validated,
            "INVALIDATED" => PixKeyStatus::Invalidated,
            _ => PixKeyStatus::NotRegistered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPayoutProfile {
    pub driver_id: Uuid,
    pub pix_key: Option<String>,
    pub pix_key_status: PixKeyStatus,
}

impl DriverPayoutProfile {
    pub fn payout_destination(&self) -> Option<&str> {
        match (&self.pix_key, self.pix_key_status) {
            (Some(key), PixKeyStatus::Validated) if !key.trim().is_empty() => Some(key.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyValidationStatus {
    InProgress,
    Confirmed,
    Rejected,
}

impl KeyValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyValidationStatus::InProgress => "IN_PROGRESS",
            KeyValidationStatus::Confirmed => "CONFIRMED",
            KeyValidationStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CONFIRMED" => KeyValidationStatus::Confirmed,
            "REJECTED" => KeyValidationStatus::Rejected,
            _ => KeyValidationStatus::InProgress,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixKeyValidation {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub pix_key: String,
    pub provider_reference: String,
    pub status: KeyValidationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
