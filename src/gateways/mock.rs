use crate::domain::charge::ChargeType;
use crate::error::PipelineError;
use crate::gateways::fees::FeeSchedule;
use crate::gateways::{
    ChargeRequest, PaymentProvider, ProviderCharge, ProviderChargeStatus, ProviderTransfer,
    ProviderTransferState, TransferRequest,
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    AlwaysSuccess,
    AlwaysReject,
    AlwaysTimeout,
    /// The transfer goes through upstream but the response never arrives.
    TimeoutAfterCommit,
    InFlight,
}

/// Sandbox gateway: keeps charges, transfers and confirmed payments in
/// memory and answers according to `behavior`.
pub struct MockProvider {
    behavior: Mutex<MockBehavior>,
    fees: FeeSchedule,
    charges: Mutex<HashMap<String, ProviderCharge>>,
    transfers: Mutex<HashMap<String, ProviderTransfer>>,
    payments: Mutex<Vec<serde_json::Value>>,
    transfer_calls: AtomicUsize,
}

const E2E_PREFIX: &str = "E2EMOCK";

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self::with_fees(behavior, FeeSchedule::free())
    }

    pub fn with_fees(behavior: MockBehavior, fees: FeeSchedule) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            fees,
            charges: Mutex::new(HashMap::new()),
            transfers: Mutex::new(HashMap::new()),
            payments: Mutex::new(Vec::new()),
            transfer_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        if let Ok(mut b) = self.behavior.lock() {
            *b = behavior;
        }
    }

    fn behavior(&self) -> MockBehavior {
        self.behavior
            .lock()
            .map(|b| *b)
            .unwrap_or(MockBehavior::AlwaysSuccess)
    }

    /// Adds a confirmed payment to the listing returned by
    /// `list_recent_payments`.
    pub fn record_payment(&self, raw: serde_json::Value) {
        if let Ok(mut p) = self.payments.lock() {
            p.push(raw);
        }
    }

    /// Moves a stored transfer to a new upstream state.
    pub fn settle_transfer(&self, reference: &str, state: ProviderTransferState) {
        let key = Self::key_for(reference);
        if let Ok(mut t) = self.transfers.lock() {
            if let Some(existing) = t.get_mut(&key) {
                existing.state = state;
            }
        }
    }

    pub fn transfer_calls(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub fn completed_transfers(&self) -> usize {
        self.transfers
            .lock()
            .map(|t| {
                t.values()
                    .filter(|x| x.state == ProviderTransferState::Completed)
                    .count()
            })
            .unwrap_or(0)
    }

    fn key_for(reference: &str) -> String {
        reference
            .strip_prefix(E2E_PREFIX)
            .unwrap_or(reference)
            .to_string()
    }

    fn store_transfer(&self, key: &str, state: ProviderTransferState) -> Result<ProviderTransfer> {
        let transfer = ProviderTransfer {
            provider_transfer_id: Some(format!("{}{}", E2E_PREFIX, key)),
            state,
        };
        let mut t = self
            .transfers
            .lock()
            .map_err(|_| anyhow!("mock transfer store poisoned"))?;
        Ok(t.entry(key.to_string()).or_insert(transfer).clone())
    }
}

#[async_trait::async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ProviderCharge> {
        let charge = ProviderCharge {
            txid: request.txid.clone(),
            status: ProviderChargeStatus::Active,
            pix_copy_paste: Some(format!("00020126mock{}", request.txid)),
            end_to_end_id: None,
            paid_amount_minor: None,
        };
        self.charges
            .lock()
            .map_err(|_| anyhow!("mock charge store poisoned"))?
            .insert(request.txid, charge.clone());
        Ok(charge)
    }

    async fn query_charge(&self, txid: &str) -> Result<ProviderCharge> {
        self.charges
            .lock()
            .map_err(|_| anyhow!("mock charge store poisoned"))?
            .get(txid)
            .cloned()
            .ok_or_else(|| anyhow!("mock charge {} not found", txid))
    }

    async fn create_transfer(&self, request: TransferRequest) -> Result<ProviderTransfer> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        let key = request.idempotency_key;
        match self.behavior() {
            MockBehavior::AlwaysSuccess => self.store_transfer(&key, ProviderTransferState::Completed),
            MockBehavior::InFlight => self.store_transfer(&key, ProviderTransferState::InFlight),
            MockBehavior::AlwaysReject => {
                self.store_transfer(&key, ProviderTransferState::Failed("mock decline".to_string()))
            }
            MockBehavior::AlwaysTimeout => {
                Err(PipelineError::ProviderTimeout(Duration::from_millis(1)).into())
            }
            MockBehavior::TimeoutAfterCommit => {
                self.store_transfer(&key, ProviderTransferState::Completed)?;
                Err(PipelineError::ProviderTimeout(Duration::from_millis(1)).into())
            }
        }
    }

    async fn query_transfer(&self, reference: &str) -> Result<ProviderTransfer> {
        let key = Self::key_for(reference);
        let found = self
            .transfers
            .lock()
            .map_err(|_| anyhow!("mock transfer store poisoned"))?
            .get(&key)
            .cloned();
        Ok(found.unwrap_or(ProviderTransfer {
            provider_transfer_id: None,
            state: ProviderTransferState::NotFound,
        }))
    }

    async fn list_recent_payments(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        until: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<serde_json::Value>> {
        let payments = self
            .payments
            .lock()
            .map_err(|_| anyhow!("mock payment list poisoned"))?;
        Ok(payments
            .iter()
            .filter(|p| {
                p.get("horario")
                    .and_then(|h| h.as_str())
                    .and_then(|h| chrono::DateTime::parse_from_rfc3339(h).ok())
                    .map(|h| {
                        let h = h.with_timezone(&chrono::Utc);
                        h >= since && h <= until
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    fn fee(&self, amount_minor: i64, charge_type: ChargeType) -> i64 {
        self.fees.fee(amount_minor, charge_type)
    }
}
