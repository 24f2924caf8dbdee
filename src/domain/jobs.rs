use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutJob {
    pub charge_id: Uuid,
    pub gross_amount_minor: i64,
}

/// Receipt generation request handed to the notification subsystem. Carries
/// enough context to message both payer and driver without reading our
/// tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptJob {
    pub charge_id: Uuid,
    pub driver_id: Uuid,
    pub passenger_id: Option<Uuid>,
    pub amount_minor: i64,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub end_to_end_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRegistrationJob {
    pub driver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub item: String,
    pub error: String,
}

/// Outcome of one monitoring/retry job run. Returned verbatim by the job
/// trigger endpoint so operators see per-item failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReport {
    pub job: String,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
}

impl JobReport {
    pub fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            ..Self::default()
        }
    }

    pub fn record_error(&mut self, item: impl ToString, err: &anyhow::Error) {
        self.failed += 1;
        self.errors.push(ItemError {
            item: item.to_string(),
            error: format!("{:#}", err),
        });
    }
}
