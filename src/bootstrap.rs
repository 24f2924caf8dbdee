use crate::gateways::PaymentProvider;
use crate::jobs::{JobContext, JobSettings};
use crate::queue::JobQueue;
use crate::repo::charges_repo::ChargesRepo;
use crate::repo::drivers_repo::DriversRepo;
use crate::repo::key_validations_repo::KeyValidationsRepo;
use crate::repo::subscriptions_repo::SubscriptionsRepo;
use crate::repo::transfers_repo::TransfersRepo;
use crate::repo::{ChargeStore, DriverStore, KeyValidationStore, SubscriptionActivator, TransferStore};
use crate::service::key_validation_service::KeyValidationService;
use crate::service::payout_service::PayoutService;
use crate::webhook::ingest::WebhookIngestor;
use crate::webhook::passenger_handler::PassengerChargeHandler;
use crate::webhook::router::{PaymentContextHandler, WebhookRouter};
use crate::webhook::subscription_handler::SubscriptionPaymentHandler;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct Stores {
    pub charges: Arc<dyn ChargeStore>,
    pub transfers: Arc<dyn TransferStore>,
    pub drivers: Arc<dyn DriverStore>,
    pub validations: Arc<dyn KeyValidationStore>,
    pub activator: Arc<dyn SubscriptionActivator>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            charges: Arc::new(ChargesRepo { pool: pool.clone() }),
            transfers: Arc::new(TransfersRepo { pool: pool.clone() }),
            drivers: Arc::new(DriversRepo { pool: pool.clone() }),
            validations: Arc::new(KeyValidationsRepo { pool: pool.clone() }),
            activator: Arc::new(SubscriptionsRepo { pool: pool.clone() }),
        }
    }
}

/// The wired pipeline: the same objects back the API, the queue workers and
/// the scheduler.
#[derive(Clone)]
pub struct Pipeline {
    pub ingestor: WebhookIngestor,
    pub router: Arc<WebhookRouter>,
    pub payouts: Arc<PayoutService>,
    pub key_validation: Arc<KeyValidationService>,
    pub jobs: JobContext,
}

impl Pipeline {
    pub fn assemble(
        stores: Stores,
        queue: Arc<dyn JobQueue>,
        provider: Arc<dyn PaymentProvider>,
        settings: JobSettings,
    ) -> Self {
        // Subscription invoices are tried first.
        let handlers: Vec<Arc<dyn PaymentContextHandler>> = vec![
            Arc::new(SubscriptionPaymentHandler {
                charges: stores.charges.clone(),
                activator: stores.activator.clone(),
            }),
            Arc::new(PassengerChargeHandler {
                charges: stores.charges.clone(),
                queue: queue.clone(),
            }),
        ];
        let router = Arc::new(WebhookRouter::new(handlers));

        let payouts = Arc::new(PayoutService {
            charges: stores.charges.clone(),
            transfers: stores.transfers.clone(),
            drivers: stores.drivers.clone(),
            provider: provider.clone(),
            provider_timeout: settings.provider_timeout,
        });

        let key_validation = Arc::new(KeyValidationService {
            drivers: stores.drivers.clone(),
            validations: stores.validations.clone(),
            provider: provider.clone(),
            provider_timeout: settings.provider_timeout,
        });

        let jobs = JobContext {
            charges: stores.charges.clone(),
            transfers: stores.transfers.clone(),
            validations: stores.validations.clone(),
            provider,
            router: router.clone(),
            payouts: payouts.clone(),
            key_validation: key_validation.clone(),
            settings,
        };

        Self {
            ingestor: WebhookIngestor { queue },
            router,
            payouts,
            key_validation,
            jobs,
        }
    }
}
