use crate::domain::transfer::{NewTransfer, TransferRecord, TransferStatus};
use crate::repo::TransferStore;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct TransfersRepo {
    pub pool: PgPool,
}

const COLUMNS: &str = "id, charge_id, driver_id, amount_minor, fee_minor, status, idempotency_key, provider_transfer_id, failure_reason, created_at, updated_at";

fn map_row(r: PgRow) -> TransferRecord {
    let status: String = r.get("status");
    TransferRecord {
        id: r.get("id"),
        charge_id: r.get("charge_id"),
        driver_id: r.get("driver_id"),
        amount_minor: r.get("amount_minor"),
        fee_minor: r.get("fee_minor"),
        status: TransferStatus::parse(&status),
        idempotency_key: r.get("idempotency_key"),
        provider_transfer_id: r.get("provider_transfer_id"),
        failure_reason: r.get("failure_reason"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[async_trait::async_trait]
impl TransferStore for TransfersRepo {
    async fn open_or_create(&self, new: &NewTransfer) -> Result<TransferRecord> {
        let id = Uuid::new_v4();
        let idempotency_key = new
            .idempotency_key
            .clone()
            .unwrap_or_else(|| id.simple().to_string());

        // payout_transfers_one_open_per_charge makes this race-safe.
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO payout_transfers (id, charge_id, driver_id, amount_minor, fee_minor, status, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'PROCESSING', $6, now(), now())
            ON CONFLICT (charge_id) WHERE status = 'PROCESSING' DO NOTHING
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(new.charge_id)
        .bind(new.driver_id)
        .bind(new.amount_minor)
        .bind(new.fee_minor)
        .bind(&idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(map_row(row));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM payout_transfers WHERE charge_id = $1 AND status = 'PROCESSING'",
            COLUMNS
        ))
        .bind(new.charge_id)
        .fetch_optional(&self.pool)
        .await?;

        existing
            .map(map_row)
            .ok_or_else(|| anyhow!("open transfer for charge {} vanished during insert", new.charge_id))
    }

    async fn list_for_charge(&self, charge_id: Uuid) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payout_transfers WHERE charge_id = $1 ORDER BY created_at ASC",
            COLUMNS
        ))
        .bind(charge_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn set_provider_id(&self, id: Uuid, provider_transfer_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE payout_transfers SET provider_transfer_id = $2, updated_at = now() WHERE id = $1 AND status = 'PROCESSING'",
        )
        .bind(id)
        .bind(provider_transfer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TransferStatus,
        provider_transfer_id: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE payout_transfers
            SET status = $2,
                provider_transfer_id = COALESCE($3, provider_transfer_id),
                failure_reason = $4,
                updated_at = now()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(provider_transfer_id)
        .bind(failure_reason)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn list_processing(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM payout_transfers
            WHERE status = 'PROCESSING' AND created_at >= $1 AND created_at <= $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
            COLUMNS
        ))
        .bind(created_after)
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }
}
