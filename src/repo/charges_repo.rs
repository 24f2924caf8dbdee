use crate::domain::charge::{Charge, ChargeKind, ChargeStatus, ChargeType, PaidUpdate, PayoutStatus};
use crate::repo::{status_strings, ChargeStore};
use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChargesRepo {
    pub pool: PgPool,
}

fn select_sql(kind: ChargeKind) -> &'static str {
    match kind {
        ChargeKind::SubscriptionInvoice => {
            r#"
            SELECT id, user_id, NULL::uuid AS passenger_id, amount_minor, due_date, status,
                   gateway_transaction_id, charge_type, paid_amount_minor, paid_at,
                   'PENDING' AS payout_status
            FROM subscription_invoices
            "#
        }
        ChargeKind::PassengerCharge => {
            r#"
            SELECT id, user_id, passenger_id, amount_minor, due_date, status,
                   gateway_transaction_id, charge_type, paid_amount_minor, paid_at,
                   payout_status
            FROM passenger_charges
            "#
        }
    }
}

fn table(kind: ChargeKind) -> &'static str {
    match kind {
        ChargeKind::SubscriptionInvoice => "subscription_invoices",
        ChargeKind::PassengerCharge => "passenger_charges",
    }
}

fn map_row(kind: ChargeKind, r: PgRow) -> Charge {
    let status: String = r.get("status");
    let charge_type: String = r.get("charge_type");
    let payout_status: String = r.get("payout_status");
    Charge {
        id: r.get("id"),
        kind,
        user_id: r.get("user_id"),
        passenger_id: r.get("passenger_id"),
        amount_minor: r.get("amount_minor"),
        due_date: r.get("due_date"),
        status: ChargeStatus::parse(&status),
        gateway_transaction_id: r.get("gateway_transaction_id"),
        charge_type: ChargeType::parse(&charge_type),
        paid_amount_minor: r.get("paid_amount_minor"),
        paid_at: r.get("paid_at"),
        payout_status: PayoutStatus::parse(&payout_status),
    }
}

#[async_trait::async_trait]
impl ChargeStore for ChargesRepo {
    async fn find_by_gateway_txid(&self, kind: ChargeKind, txid: &str) -> Result<Option<Charge>> {
        let sql = format!("{} WHERE gateway_transaction_id = $1", select_sql(kind));
        let row = sqlx::query(&sql)
            .bind(txid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| map_row(kind, r)))
    }

    async fn get(&self, kind: ChargeKind, id: Uuid) -> Result<Option<Charge>> {
        let sql = format!("{} WHERE id = $1", select_sql(kind));
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| map_row(kind, r)))
    }

    async fn mark_paid(&self, kind: ChargeKind, id: Uuid, update: &PaidUpdate) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE {}
            SET status = 'PAID', paid_amount_minor = $2, paid_at = $3, end_to_end_id = $4, updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            "#,
            table(kind)
        );
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(update.paid_amount_minor)
            .bind(update.paid_at)
            .bind(update.end_to_end_id.clone())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_payout_status(
        &self,
        id: Uuid,
        expected: &[PayoutStatus],
        next: PayoutStatus,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE passenger_charges
            SET payout_status = $3, updated_at = now()
            WHERE id = $1 AND payout_status = ANY($2)
            "#,
        )
        .bind(id)
        .bind(status_strings(expected, PayoutStatus::as_str))
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn payout_retry_candidates(&self, limit: i64) -> Result<Vec<Charge>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.user_id, c.passenger_id, c.amount_minor, c.due_date, c.status,
                   c.gateway_transaction_id, c.charge_type, c.paid_amount_minor, c.paid_at,
                   c.payout_status
            FROM passenger_charges c
            JOIN driver_payout_profiles d ON d.driver_id = c.user_id
            WHERE c.status = 'PAID'
              AND c.payout_status IN ('FAILED', 'PENDING')
              AND d.pix_key_status = 'VALIDATED'
              AND d.pix_key IS NOT NULL
            ORDER BY c.paid_at ASC NULLS LAST
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| map_row(ChargeKind::PassengerCharge, r))
            .collect())
    }
}
