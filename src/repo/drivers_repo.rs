use crate::domain::driver::{DriverPayoutProfile, PixKeyStatus};
use crate::repo::{status_strings, DriverStore};
use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct DriversRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl DriverStore for DriversRepo {
    async fn payout_profile(&self, driver_id: Uuid) -> Result<Option<DriverPayoutProfile>> {
        let row = sqlx::query(
            "SELECT driver_id, pix_key, pix_key_status FROM driver_payout_profiles WHERE driver_id = $1",
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status: String = r.get("pix_key_status");
            DriverPayoutProfile {
                driver_id: r.get("driver_id"),
                pix_key: r.get("pix_key"),
                pix_key_status: PixKeyStatus::parse(&status),
            }
        }))
    }

    async fn set_pix_key_status(
        &self,
        driver_id: Uuid,
        expected: &[PixKeyStatus],
        next: PixKeyStatus,
        reason: Option<&str>,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE driver_payout_profiles
            SET pix_key_status = $3, pix_key_status_reason = $4, updated_at = now()
            WHERE driver_id = $1 AND pix_key_status = ANY($2)
            "#,
        )
        .bind(driver_id)
        .bind(status_strings(expected, PixKeyStatus::as_str))
        .bind(next.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
