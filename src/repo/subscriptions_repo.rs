use crate::domain::charge::Charge;
use crate::repo::SubscriptionActivator;
use anyhow::Result;
use sqlx::PgPool;

#[derive(Clone)]
pub struct SubscriptionsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl SubscriptionActivator for SubscriptionsRepo {
    /// Validity runs one month past the invoice due date. Replaying the
    /// same invoice matches no row, so it cannot extend twice.
    async fn activate(&self, invoice: &Charge) -> Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE subscriptions s
            SET status = 'ACTIVE',
                valid_until = GREATEST(COALESCE(s.valid_until, i.due_date), (i.due_date + INTERVAL '1 month')::date),
                updated_at = now()
            FROM subscription_invoices i
            WHERE i.id = $1 AND s.id = i.subscription_id
              AND (s.status <> 'ACTIVE'
                   OR s.valid_until IS NULL
                   OR s.valid_until < (i.due_date + INTERVAL '1 month')::date)
            "#,
        )
        .bind(invoice.id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            tracing::debug!("invoice {}: subscription already covers it or is missing", invoice.id);
        } else {
            tracing::info!("subscription for invoice {} activated", invoice.id);
        }
        Ok(())
    }
}
