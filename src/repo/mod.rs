use crate::domain::charge::{Charge, ChargeKind, PaidUpdate, PayoutStatus};
use crate::domain::driver::{DriverPayoutProfile, KeyValidationStatus, PixKeyStatus, PixKeyValidation};
use crate::domain::transfer::{NewTransfer, TransferRecord, TransferStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod charges_repo;
pub mod drivers_repo;
pub mod key_validations_repo;
pub mod subscriptions_repo;
pub mod transfers_repo;

// Every mutation below is a single-row UPDATE guarded on the expected
// previous status; `false` means another writer got there first.

#[async_trait::async_trait]
pub trait ChargeStore: Send + Sync {
    async fn find_by_gateway_txid(&self, kind: ChargeKind, txid: &str) -> Result<Option<Charge>>;

    async fn get(&self, kind: ChargeKind, id: Uuid) -> Result<Option<Charge>>;

    /// PENDING -> PAID.
    async fn mark_paid(&self, kind: ChargeKind, id: Uuid, update: &PaidUpdate) -> Result<bool>;

    /// Passenger charges only.
    async fn set_payout_status(
        &self,
        id: Uuid,
        expected: &[PayoutStatus],
        next: PayoutStatus,
    ) -> Result<bool>;

    /// PAID passenger charges with payout FAILED or PENDING whose driver key
    /// is VALIDATED.
    async fn payout_retry_candidates(&self, limit: i64) -> Result<Vec<Charge>>;
}

#[async_trait::async_trait]
pub trait TransferStore: Send + Sync {
    /// Inserts a PROCESSING transfer, or returns the one already open for
    /// the same charge.
    async fn open_or_create(&self, new: &NewTransfer) -> Result<TransferRecord>;

    async fn list_for_charge(&self, charge_id: Uuid) -> Result<Vec<TransferRecord>>;

    async fn set_provider_id(&self, id: Uuid, provider_transfer_id: &str) -> Result<()>;

    /// PROCESSING -> SUCCESS | ERROR.
    async fn finish(
        &self,
        id: Uuid,
        status: TransferStatus,
        provider_transfer_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<bool>;

    async fn list_processing(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransferRecord>>;
}

#[async_trait::async_trait]
pub trait DriverStore: Send + Sync {
    async fn payout_profile(&self, driver_id: Uuid) -> Result<Option<DriverPayoutProfile>>;

    async fn set_pix_key_status(
        &self,
        driver_id: Uuid,
        expected: &[PixKeyStatus],
        next: PixKeyStatus,
        reason: Option<&str>,
    ) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait KeyValidationStore: Send + Sync {
    async fn create(&self, validation: &PixKeyValidation) -> Result<()>;

    async fn open_for_driver(&self, driver_id: Uuid) -> Result<Option<PixKeyValidation>>;

    async fn list_in_progress(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PixKeyValidation>>;

    /// IN_PROGRESS -> CONFIRMED | REJECTED.
    async fn resolve(&self, id: Uuid, next: KeyValidationStatus) -> Result<bool>;
}

/// Billing collaborator: extends the owner's subscription once an invoice
/// is paid.
#[async_trait::async_trait]
pub trait SubscriptionActivator: Send + Sync {
    async fn activate(&self, invoice: &Charge) -> Result<()>;
}

pub(crate) fn status_strings<T, F: Fn(&T) -> &'static str>(items: &[T], f: F) -> Vec<String> {
    items.iter().map(|s| f(s).to_string()).collect()
}
