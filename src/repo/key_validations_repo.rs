use crate::domain::driver::{KeyValidationStatus, PixKeyValidation};
use crate::repo::KeyValidationStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct KeyValidationsRepo {
    pub pool: PgPool,
}

fn map_row(r: PgRow) -> PixKeyValidation {
    let status: String = r.get("status");
    PixKeyValidation {
        id: r.get("id"),
        driver_id: r.get("driver_id"),
        pix_key: r.get("pix_key"),
        provider_reference: r.get("provider_reference"),
        status: KeyValidationStatus::parse(&status),
        created_at: r.get("created_at"),
    }
}

#[async_trait::async_trait]
impl KeyValidationStore for KeyValidationsRepo {
    async fn create(&self, validation: &PixKeyValidation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pix_key_validations (id, driver_id, pix_key, provider_reference, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(validation.id)
        .bind(validation.driver_id)
        .bind(&validation.pix_key)
        .bind(&validation.provider_reference)
        .bind(validation.status.as_str())
        .bind(validation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_for_driver(&self, driver_id: Uuid) -> Result<Option<PixKeyValidation>> {
        let row = sqlx::query(
            r#"
            SELECT id, driver_id, pix_key, provider_reference, status, created_at
            FROM pix_key_validations
            WHERE driver_id = $1 AND status = 'IN_PROGRESS'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(map_row))
    }

    async fn list_in_progress(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PixKeyValidation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, driver_id, pix_key, provider_reference, status, created_at
            FROM pix_key_validations
            WHERE status = 'IN_PROGRESS' AND created_at >= $1 AND created_at <= $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(created_after)
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    async fn resolve(&self, id: Uuid, next: KeyValidationStatus) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE pix_key_validations SET status = $2, updated_at = now() WHERE id = $1 AND status = 'IN_PROGRESS'",
        )
        .bind(id)
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
