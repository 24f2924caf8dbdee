#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use pix_payouts::bootstrap::{Pipeline, Stores};
use pix_payouts::domain::charge::{
    Charge, ChargeKind, ChargeStatus, ChargeType, PaidUpdate, PayoutStatus,
};
use pix_payouts::domain::driver::{
    DriverPayoutProfile, KeyValidationStatus, PixKeyStatus, PixKeyValidation,
};
use pix_payouts::domain::event::StandardPaymentEvent;
use pix_payouts::domain::transfer::{NewTransfer, TransferRecord, TransferStatus};
use pix_payouts::error::PipelineError;
use pix_payouts::gateways::PaymentProvider;
use pix_payouts::jobs::schedule::{JobName, SlotLedger};
use pix_payouts::jobs::JobSettings;
use pix_payouts::queue::worker::{JobHandler, JobOutcome, QueueWorker};
use pix_payouts::queue::{
    EnqueueOptions, EnqueueOutcome, FailOutcome, Job, JobQueue, JobState, QueueSettings,
};
use pix_payouts::repo::{
    ChargeStore, DriverStore, KeyValidationStore, SubscriptionActivator, TransferStore,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Postgres stand-in. Each guarded update counts in `writes` only when it
/// changed a row.
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<StoreState>,
}

#[derive(Default)]
pub struct StoreState {
    pub charges: HashMap<Uuid, Charge>,
    pub transfers: Vec<TransferRecord>,
    pub drivers: HashMap<Uuid, DriverPayoutProfile>,
    pub validations: HashMap<Uuid, PixKeyValidation>,
    pub activations: Vec<Uuid>,
    pub activation_down: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            charges: self.clone(),
            transfers: self.clone(),
            drivers: self.clone(),
            validations: self.clone(),
            activator: self.clone(),
        }
    }

    pub fn insert_charge(&self, charge: Charge) {
        self.state.lock().unwrap().charges.insert(charge.id, charge);
    }

    pub fn insert_driver(&self, driver_id: Uuid, pix_key: Option<&str>, status: PixKeyStatus) {
        self.state.lock().unwrap().drivers.insert(
            driver_id,
            DriverPayoutProfile {
                driver_id,
                pix_key: pix_key.map(str::to_string),
                pix_key_status: status,
            },
        );
    }

    pub fn charge(&self, id: Uuid) -> Charge {
        self.state.lock().unwrap().charges[&id].clone()
    }

    pub fn transfers_for(&self, charge_id: Uuid) -> Vec<TransferRecord> {
        self.state
            .lock()
            .unwrap()
            .transfers
            .iter()
            .filter(|t| t.charge_id == charge_id)
            .cloned()
            .collect()
    }

    pub fn key_status(&self, driver_id: Uuid) -> PixKeyStatus {
        self.state.lock().unwrap().drivers[&driver_id].pix_key_status
    }

    pub fn validations_for(&self, driver_id: Uuid) -> Vec<PixKeyValidation> {
        self.state
            .lock()
            .unwrap()
            .validations
            .values()
            .filter(|v| v.driver_id == driver_id)
            .cloned()
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn set_activation_down(&self, down: bool) {
        self.state.lock().unwrap().activation_down = down;
    }

    pub fn activations(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().activations.clone()
    }

    /// Moves a transfer's creation time back, for age-window tests.
    pub fn age_transfer(&self, id: Uuid, by: chrono::Duration) {
        let mut s = self.state.lock().unwrap();
        if let Some(t) = s.transfers.iter_mut().find(|t| t.id == id) {
            t.created_at = t.created_at - by;
        }
    }
}

#[async_trait::async_trait]
impl ChargeStore for MemoryStore {
    async fn find_by_gateway_txid(&self, kind: ChargeKind, txid: &str) -> Result<Option<Charge>> {
        let s = self.state.lock().unwrap();
        Ok(s.charges
            .values()
            .find(|c| c.kind == kind && c.gateway_transaction_id == txid)
            .cloned())
    }

    async fn get(&self, kind: ChargeKind, id: Uuid) -> Result<Option<Charge>> {
        let s = self.state.lock().unwrap();
        Ok(s.charges.get(&id).filter(|c| c.kind == kind).cloned())
    }

    async fn mark_paid(&self, kind: ChargeKind, id: Uuid, update: &PaidUpdate) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        let changed = match s.charges.get_mut(&id) {
            Some(c) if c.kind == kind && c.status == ChargeStatus::Pending => {
                c.status = ChargeStatus::Paid;
                c.paid_amount_minor = Some(update.paid_amount_minor);
                c.paid_at = Some(update.paid_at);
                true
            }
            _ => false,
        };
        if changed {
            s.writes += 1;
        }
        Ok(changed)
    }

    async fn set_payout_status(
        &self,
        id: Uuid,
        expected: &[PayoutStatus],
        next: PayoutStatus,
    ) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        let changed = match s.charges.get_mut(&id) {
            Some(c) if c.kind == ChargeKind::PassengerCharge && expected.contains(&c.payout_status) => {
                c.payout_status = next;
                true
            }
            _ => false,
        };
        if changed {
            s.writes += 1;
        }
        Ok(changed)
    }

    async fn payout_retry_candidates(&self, limit: i64) -> Result<Vec<Charge>> {
        let s = self.state.lock().unwrap();
        Ok(s.charges
            .values()
            .filter(|c| {
                c.kind == ChargeKind::PassengerCharge
                    && c.status == ChargeStatus::Paid
                    && matches!(c.payout_status, PayoutStatus::Failed | PayoutStatus::Pending)
                    && s.drivers
                        .get(&c.user_id)
                        .map(|d| d.pix_key_status == PixKeyStatus::Validated)
                        .unwrap_or(false)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TransferStore for MemoryStore {
    async fn open_or_create(&self, new: &NewTransfer) -> Result<TransferRecord> {
        let mut s = self.state.lock().unwrap();
        if let Some(open) = s
            .transfers
            .iter()
            .find(|t| t.charge_id == new.charge_id && t.status == TransferStatus::Processing)
        {
            return Ok(open.clone());
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        let record = TransferRecord {
            id,
            charge_id: new.charge_id,
            driver_id: new.driver_id,
            amount_minor: new.amount_minor,
            fee_minor: new.fee_minor,
            status: TransferStatus::Processing,
            idempotency_key: new
                .idempotency_key
                .clone()
                .unwrap_or_else(|| id.simple().to_string()),
            provider_transfer_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        s.transfers.push(record.clone());
        s.writes += 1;
        Ok(record)
    }

    async fn list_for_charge(&self, charge_id: Uuid) -> Result<Vec<TransferRecord>> {
        Ok(self.transfers_for(charge_id))
    }

    async fn set_provider_id(&self, id: Uuid, provider_transfer_id: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if let Some(t) = s.transfers.iter_mut().find(|t| t.id == id) {
            t.provider_transfer_id = Some(provider_transfer_id.to_string());
        }
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TransferStatus,
        provider_transfer_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        let changed = match s.transfers.iter_mut().find(|t| t.id == id) {
            Some(t) if t.status == TransferStatus::Processing => {
                t.status = status;
                if let Some(p) = provider_transfer_id {
                    t.provider_transfer_id = Some(p.to_string());
                }
                t.failure_reason = failure_reason.map(str::to_string);
                t.updated_at = Utc::now();
                true
            }
            _ => false,
        };
        if changed {
            s.writes += 1;
        }
        Ok(changed)
    }

    async fn list_processing(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransferRecord>> {
        let s = self.state.lock().unwrap();
        Ok(s.transfers
            .iter()
            .filter(|t| {
                t.status == TransferStatus::Processing
                    && t.created_at >= created_after
                    && t.created_at <= created_before
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl DriverStore for MemoryStore {
    async fn payout_profile(&self, driver_id: Uuid) -> Result<Option<DriverPayoutProfile>> {
        Ok(self.state.lock().unwrap().drivers.get(&driver_id).cloned())
    }

    async fn set_pix_key_status(
        &self,
        driver_id: Uuid,
        expected: &[PixKeyStatus],
        next: PixKeyStatus,
        _reason: Option<&str>,
    ) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        let changed = match s.drivers.get_mut(&driver_id) {
            Some(d) if expected.contains(&d.pix_key_status) => {
                d.pix_key_status = next;
                true
            }
            _ => false,
        };
        if changed {
            s.writes += 1;
        }
        Ok(changed)
    }
}

#[async_trait::async_trait]
impl KeyValidationStore for MemoryStore {
    async fn create(&self, validation: &PixKeyValidation) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.validations.insert(validation.id, validation.clone());
        s.writes += 1;
        Ok(())
    }

    async fn open_for_driver(&self, driver_id: Uuid) -> Result<Option<PixKeyValidation>> {
        let s = self.state.lock().unwrap();
        Ok(s.validations
            .values()
            .find(|v| v.driver_id == driver_id && v.status == KeyValidationStatus::InProgress)
            .cloned())
    }

    async fn list_in_progress(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PixKeyValidation>> {
        let s = self.state.lock().unwrap();
        Ok(s.validations
            .values()
            .filter(|v| {
                v.status == KeyValidationStatus::InProgress
                    && v.created_at >= created_after
                    && v.created_at <= created_before
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn resolve(&self, id: Uuid, next: KeyValidationStatus) -> Result<bool> {
        let mut s = self.state.lock().unwrap();
        let changed = match s.validations.get_mut(&id) {
            Some(v) if v.status == KeyValidationStatus::InProgress => {
                v.status = next;
                true
            }
            _ => false,
        };
        if changed {
            s.writes += 1;
        }
        Ok(changed)
    }
}

#[async_trait::async_trait]
impl SubscriptionActivator for MemoryStore {
    async fn activate(&self, invoice: &Charge) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.activation_down {
            return Err(anyhow::anyhow!("billing store unavailable"));
        }
        if !s.activations.contains(&invoice.id) {
            s.activations.push(invoice.id);
            s.writes += 1;
        }
        Ok(())
    }
}

/// Redis stand-in with the same dedup, retry and dead-set rules. Delayed
/// jobs are ready again immediately.
#[derive(Default)]
pub struct MemoryQueue {
    pub state: Mutex<QueueState>,
    pub down: AtomicBool,
}

#[derive(Default)]
pub struct QueueState {
    pub ready: HashMap<String, VecDeque<Job>>,
    pub completed: Vec<Job>,
    pub dead: Vec<Job>,
    pub dedup: HashSet<String>,
}

impl MemoryQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .ready
            .get(queue)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn pending_payloads(&self, queue: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .unwrap()
            .ready
            .get(queue)
            .map(|q| q.iter().map(|j| j.payload.clone()).collect())
            .unwrap_or_default()
    }

    pub fn dead(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .dead
            .iter()
            .filter(|j| j.queue == queue)
            .count()
    }

    pub fn completed(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .completed
            .iter()
            .filter(|j| j.queue == queue)
            .count()
    }

    fn dedup_slot(queue: &str, key: &str) -> String {
        format!("{}:{}", queue, key)
    }
}

#[async_trait::async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<EnqueueOutcome> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PipelineError::QueueUnavailable("memory queue down".to_string()).into());
        }
        let mut s = self.state.lock().unwrap();
        if let Some(key) = &opts.dedup_key {
            if !s.dedup.insert(Self::dedup_slot(queue, key)) {
                return Ok(EnqueueOutcome::Duplicate);
            }
        }
        let job = Job::new(queue, payload, opts.dedup_key, opts.attempts, opts.backoff_ms);
        let id = job.id;
        s.ready.entry(queue.to_string()).or_default().push_back(job);
        Ok(EnqueueOutcome::Enqueued(id))
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Job>> {
        let mut s = self.state.lock().unwrap();
        let job = s.ready.get_mut(queue).and_then(|q| q.pop_front());
        Ok(job.map(|mut j| {
            j.start(Utc::now());
            j
        }))
    }

    async fn complete(&self, job: &Job) -> Result<()> {
        let mut done = job.clone();
        done.state = JobState::Completed;
        self.state.lock().unwrap().completed.push(done);
        Ok(())
    }

    async fn fail(&self, job: &Job, error: &str) -> Result<FailOutcome> {
        let mut s = self.state.lock().unwrap();
        let mut failed = job.clone();
        failed.last_error = Some(error.to_string());
        if let FailOutcome::Retrying { run_at } = failed.next_after_failure(Utc::now()) {
            failed.state = JobState::Delayed;
            failed.run_at = Some(run_at);
            s.ready.entry(failed.queue.clone()).or_default().push_back(failed);
            return Ok(FailOutcome::Retrying { run_at });
        }
        if let Some(key) = &failed.dedup_key {
            let slot = Self::dedup_slot(&failed.queue, key);
            s.dedup.remove(&slot);
        }
        failed.state = JobState::Dead;
        s.dead.push(failed);
        Ok(FailOutcome::Dead)
    }

    async fn requeue_stalled(&self, _queue: &str, _older_than: Duration) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct MemorySlotLedger {
    claimed: Mutex<HashSet<(JobName, i64)>>,
}

#[async_trait::async_trait]
impl SlotLedger for MemorySlotLedger {
    async fn claim(&self, job: JobName, slot: i64, _ttl: Duration) -> Result<bool> {
        Ok(self.claimed.lock().unwrap().insert((job, slot)))
    }
}

pub fn settings() -> JobSettings {
    JobSettings {
        payout_min_age_minutes: 0,
        provider_timeout: Duration::from_secs(2),
        ..JobSettings::default()
    }
}

pub fn pipeline(
    store: &Arc<MemoryStore>,
    queue: &Arc<MemoryQueue>,
    provider: Arc<dyn PaymentProvider>,
) -> Pipeline {
    Pipeline::assemble(store.stores(), queue.clone(), provider, settings())
}

pub fn passenger_charge(driver_id: Uuid, txid: &str, amount_minor: i64) -> Charge {
    Charge {
        id: Uuid::new_v4(),
        kind: ChargeKind::PassengerCharge,
        user_id: driver_id,
        passenger_id: Some(Uuid::new_v4()),
        amount_minor,
        due_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 10).unwrap(),
        status: ChargeStatus::Pending,
        gateway_transaction_id: txid.to_string(),
        charge_type: ChargeType::Instant,
        paid_amount_minor: None,
        paid_at: None,
        payout_status: PayoutStatus::Pending,
    }
}

pub fn subscription_invoice(owner_id: Uuid, txid: &str, amount_minor: i64) -> Charge {
    Charge {
        kind: ChargeKind::SubscriptionInvoice,
        passenger_id: None,
        ..passenger_charge(owner_id, txid, amount_minor)
    }
}

/// Inter-shaped `pix` callback body with one item.
pub fn inter_callback(txid: &str, e2e: &str, valor: &str) -> serde_json::Value {
    serde_json::json!({
        "pix": [{
            "txid": txid,
            "endToEndId": e2e,
            "valor": valor,
            "horario": Utc::now().to_rfc3339(),
        }]
    })
}

pub fn event(txid: &str, amount_minor: i64) -> StandardPaymentEvent {
    StandardPaymentEvent {
        gateway_transaction_id: txid.to_string(),
        end_to_end_id: Some(format!("E2E{}", txid)),
        amount_minor,
        paid_at: Utc::now(),
        gateway: "mock".to_string(),
        raw: serde_json::json!({}),
    }
}

/// Runs every job on `queue_name` until the queue is empty, retries
/// included.
pub async fn drain(queue: &Arc<MemoryQueue>, queue_name: &str, handler: Arc<dyn JobHandler>) -> Vec<JobOutcome> {
    let worker = QueueWorker::new(
        queue_name,
        queue.clone(),
        handler,
        QueueSettings::defaults_for(queue_name),
    );
    let mut outcomes = Vec::new();
    while let Some(outcome) = worker.process_next().await.unwrap() {
        outcomes.push(outcome);
    }
    outcomes
}
