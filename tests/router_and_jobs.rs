mod support;

use pix_payouts::domain::charge::{ChargeStatus, PayoutStatus};
use pix_payouts::domain::driver::{KeyValidationStatus, PixKeyStatus};
use pix_payouts::domain::jobs::KeyRegistrationJob;
use pix_payouts::domain::transfer::{NewTransfer, TransferStatus};
use pix_payouts::gateways::mock::{MockBehavior, MockProvider};
use pix_payouts::gateways::ProviderTransferState;
use pix_payouts::jobs::schedule::{run_job, JobName, JobOverrides, JobRun};
use pix_payouts::jobs::{key_validation_poller, payout_status_poller, webhook_reconciliation};
use pix_payouts::queue::{enqueue_json, EnqueueOptions, PAYOUT_QUEUE, PIX_KEY_REGISTRATION_QUEUE};
use pix_payouts::repo::TransferStore;
use pix_payouts::service::key_validation_service::RegistrationOutcome;
use pix_payouts::service::payout_service::PayoutAttempt;
use std::sync::Arc;
use support::{MemoryQueue, MemorySlotLedger, MemoryStore};
use uuid::Uuid;

fn mock(behavior: MockBehavior) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(behavior))
}

fn payment_listing(txid: &str, valor: &str) -> serde_json::Value {
    serde_json::json!({
        "txid": txid,
        "endToEndId": format!("E2E{}", txid),
        "valor": valor,
        "horario": chrono::Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn subscription_invoice_is_activated_without_payout() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));

    let invoice = support::subscription_invoice(Uuid::new_v4(), "SUB1", 4_990);
    store.insert_charge(invoice.clone());

    assert!(p.router.route(&support::event("SUB1", 4_990)).await.unwrap());

    assert_eq!(store.charge(invoice.id).status, ChargeStatus::Paid);
    assert_eq!(store.activations(), vec![invoice.id]);
    assert_eq!(queue.pending(PAYOUT_QUEUE), 0);
}

#[tokio::test]
async fn failed_activation_is_retried_and_finished_on_redelivery() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));

    let invoice = support::subscription_invoice(Uuid::new_v4(), "SUB2", 4_990);
    store.insert_charge(invoice.clone());
    store.set_activation_down(true);

    assert!(p.router.route(&support::event("SUB2", 4_990)).await.is_err());
    assert_eq!(store.charge(invoice.id).status, ChargeStatus::Paid);
    assert!(store.activations().is_empty());

    store.set_activation_down(false);
    assert!(p.router.route(&support::event("SUB2", 4_990)).await.unwrap());
    assert_eq!(store.activations(), vec![invoice.id]);

    let writes = store.writes();
    assert!(p.router.route(&support::event("SUB2", 4_990)).await.unwrap());
    assert_eq!(store.activations(), vec![invoice.id]);
    assert_eq!(store.writes(), writes);
}

#[tokio::test]
async fn cancelled_charge_is_handled_without_effects() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));

    let mut charge = support::passenger_charge(Uuid::new_v4(), "C1", 1_000);
    charge.status = ChargeStatus::Cancelled;
    store.insert_charge(charge.clone());

    assert!(p.router.route(&support::event("C1", 1_000)).await.unwrap());

    assert_eq!(store.charge(charge.id).status, ChargeStatus::Cancelled);
    assert_eq!(store.writes(), 0);
    assert_eq!(queue.pending(PAYOUT_QUEUE), 0);
}

#[tokio::test]
async fn unmatched_event_is_not_handled() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));

    assert!(!p.router.route(&support::event("NOPE", 1_000)).await.unwrap());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn reconciliation_recovers_missed_webhook_and_replay_writes_nothing() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let provider = mock(MockBehavior::AlwaysSuccess);
    let p = support::pipeline(&store, &queue, provider.clone());

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("driver@pix.example"), PixKeyStatus::Validated);
    let charge = support::passenger_charge(driver, "R1", 15_000);
    store.insert_charge(charge.clone());
    provider.record_payment(payment_listing("R1", "150.00"));
    provider.record_payment(payment_listing("SOMEONE-ELSE", "9.99"));
    provider.record_payment(serde_json::json!({"txid": "BROKEN", "valor": "n/a"}));

    let first = webhook_reconciliation::run(&p.jobs, 48).await.unwrap();
    assert_eq!(first.processed, 3);
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.failed, 1);
    assert_eq!(store.charge(charge.id).status, ChargeStatus::Paid);
    assert_eq!(queue.pending(PAYOUT_QUEUE), 1);

    let writes = store.writes();
    let second = webhook_reconciliation::run(&p.jobs, 48).await.unwrap();
    assert_eq!(second.succeeded, 1);
    assert_eq!(store.writes(), writes);
    assert_eq!(queue.pending(PAYOUT_QUEUE), 1);
}

#[tokio::test]
async fn poller_settles_transfer_that_timed_out_after_commit() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let provider = mock(MockBehavior::TimeoutAfterCommit);
    let p = support::pipeline(&store, &queue, provider.clone());

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("driver@pix.example"), PixKeyStatus::Validated);
    let charge = support::passenger_charge(driver, "P1", 15_000);
    store.insert_charge(charge.clone());
    p.router.route(&support::event("P1", 15_000)).await.unwrap();

    assert!(p.payouts.attempt(charge.id, false).await.is_err());
    assert_eq!(store.transfers_for(charge.id)[0].status, TransferStatus::Processing);
    assert_eq!(store.charge(charge.id).payout_status, PayoutStatus::Processing);

    let report = payout_status_poller::run(&p.jobs, 24).await.unwrap();

    assert_eq!(report.succeeded, 1);
    let t = &store.transfers_for(charge.id)[0];
    assert_eq!(t.status, TransferStatus::Success);
    assert!(t.provider_transfer_id.is_some());
    assert_eq!(store.charge(charge.id).payout_status, PayoutStatus::Transferred);
    assert_eq!(provider.transfer_calls(), 1);

    assert_eq!(
        p.payouts.attempt(charge.id, false).await.unwrap(),
        PayoutAttempt::Skipped("already transferred")
    );
}

#[tokio::test]
async fn poller_waits_on_in_flight_then_applies_upstream_failure() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let provider = mock(MockBehavior::InFlight);
    let p = support::pipeline(&store, &queue, provider.clone());

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("driver@pix.example"), PixKeyStatus::Validated);
    let charge = support::passenger_charge(driver, "P2", 6_000);
    store.insert_charge(charge.clone());
    p.router.route(&support::event("P2", 6_000)).await.unwrap();
    assert_eq!(p.payouts.attempt(charge.id, false).await.unwrap(), PayoutAttempt::InFlight);

    let waiting = payout_status_poller::run(&p.jobs, 24).await.unwrap();
    assert_eq!(waiting.skipped, 1);
    assert_eq!(store.transfers_for(charge.id)[0].status, TransferStatus::Processing);

    let reference = store.transfers_for(charge.id)[0].provider_reference();
    provider.settle_transfer(&reference, ProviderTransferState::Failed("conta encerrada".to_string()));
    let settled = payout_status_poller::run(&p.jobs, 24).await.unwrap();

    assert_eq!(settled.succeeded, 1);
    assert_eq!(store.transfers_for(charge.id)[0].status, TransferStatus::Error);
    assert_eq!(store.charge(charge.id).payout_status, PayoutStatus::Failed);
    assert_eq!(store.key_status(driver), PixKeyStatus::Invalidated);
}

#[tokio::test]
async fn poller_gives_up_on_transfers_the_provider_never_saw() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("driver@pix.example"), PixKeyStatus::Validated);
    let mut charge = support::passenger_charge(driver, "P3", 2_500);
    charge.status = ChargeStatus::Paid;
    charge.payout_status = PayoutStatus::Processing;
    store.insert_charge(charge.clone());
    let orphan = store
        .open_or_create(&NewTransfer {
            charge_id: charge.id,
            driver_id: driver,
            amount_minor: 2_500,
            fee_minor: 0,
            idempotency_key: None,
        })
        .await
        .unwrap();

    let fresh = payout_status_poller::run(&p.jobs, 24).await.unwrap();
    assert_eq!(fresh.skipped, 1);

    store.age_transfer(orphan.id, chrono::Duration::minutes(31));
    let stale = payout_status_poller::run(&p.jobs, 24).await.unwrap();

    assert_eq!(stale.succeeded, 1);
    assert_eq!(store.transfers_for(charge.id)[0].status, TransferStatus::Error);
    assert_eq!(store.charge(charge.id).payout_status, PayoutStatus::Failed);
    assert_eq!(store.key_status(driver), PixKeyStatus::Validated);
}

#[tokio::test]
async fn key_registration_job_and_poller_validate_the_key() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let provider = mock(MockBehavior::InFlight);
    let p = support::pipeline(&store, &queue, provider.clone());

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("driver@pix.example"), PixKeyStatus::NotRegistered);
    enqueue_json(
        queue.as_ref(),
        PIX_KEY_REGISTRATION_QUEUE,
        &KeyRegistrationJob { driver_id: driver },
        EnqueueOptions::for_queue(PIX_KEY_REGISTRATION_QUEUE).dedup(format!("key:{}", driver)),
    )
    .await
    .unwrap();

    support::drain(&queue, PIX_KEY_REGISTRATION_QUEUE, p.key_validation.clone()).await;

    assert_eq!(store.key_status(driver), PixKeyStatus::Pending);
    let validation = store.validations_for(driver).pop().unwrap();
    assert_eq!(validation.status, KeyValidationStatus::InProgress);

    let pending = key_validation_poller::run(&p.jobs, 24).await.unwrap();
    assert_eq!(pending.skipped, 1);

    provider.settle_transfer(&validation.provider_reference, ProviderTransferState::Completed);
    let resolved = key_validation_poller::run(&p.jobs, 24).await.unwrap();

    assert_eq!(resolved.succeeded, 1);
    assert_eq!(store.key_status(driver), PixKeyStatus::Validated);
    assert_eq!(
        store.validations_for(driver)[0].status,
        KeyValidationStatus::Confirmed
    );
}

#[tokio::test]
async fn rejected_validation_invalidates_the_key() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysReject));

    let driver = Uuid::new_v4();
    store.insert_driver(driver, Some("wrong@pix.example"), PixKeyStatus::NotRegistered);

    let outcome = p.key_validation.start_validation(driver).await.unwrap();

    assert!(matches!(outcome, RegistrationOutcome::Rejected(_)));
    assert_eq!(store.key_status(driver), PixKeyStatus::Invalidated);
    assert_eq!(store.validations_for(driver)[0].status, KeyValidationStatus::Rejected);
}

#[tokio::test]
async fn orchestrator_claims_each_slot_once() {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let p = support::pipeline(&store, &queue, mock(MockBehavior::AlwaysSuccess));
    let ledger = MemorySlotLedger::default();
    let now = chrono::Utc::now();

    for name in JobName::ALL {
        let first = run_job(name, &p.jobs, &ledger, &JobOverrides::default(), now).await.unwrap();
        assert!(matches!(first, JobRun::Ran(ref r) if r.job == name.as_str()));

        let second = run_job(name, &p.jobs, &ledger, &JobOverrides::default(), now).await.unwrap();
        assert!(matches!(second, JobRun::SlotClaimed));
    }

    let forced = JobOverrides {
        force: true,
        window_hours: Some(1),
    };
    let run = run_job(JobName::WebhookReconciliation, &p.jobs, &ledger, &forced, now)
        .await
        .unwrap();
    assert!(matches!(run, JobRun::Ran(_)));

    let next_slot = now + chrono::Duration::minutes(5);
    let later = run_job(JobName::PayoutRetry, &p.jobs, &ledger, &JobOverrides::default(), next_slot)
        .await
        .unwrap();
    assert!(matches!(later, JobRun::Ran(_)));
}
