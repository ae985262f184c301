use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pfm_reconcile::{ResetMarkerStore, UserId, VoucherResetter, YearMonth};
use serde::Serialize;
use sqlx::PgPool;

/// Once-per-month marker shared by every process on the database.
///
/// `claim_month` is a single `insert .. on conflict do nothing`, so of two
/// concurrent claimers exactly one sees a row inserted.
#[derive(Clone)]
pub struct PgResetMarker {
    pool: PgPool,
}

impl PgResetMarker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ResetMarkerStore for PgResetMarker {
    async fn last_reset_month(&self) -> Result<Option<YearMonth>> {
        // YYYY-MM sorts lexically in calendar order.
        let row: Option<(String,)> = sqlx::query_as(
            "select year_month from voucher_reset_marks order by year_month desc limit 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("last_reset_month failed")?;

        row.map(|(ym,)| ym.parse::<YearMonth>().map_err(anyhow::Error::from))
            .transpose()
    }

    async fn claim_month(&self, month: YearMonth, at: DateTime<Utc>) -> Result<bool> {
        let res = sqlx::query(
            r#"
            insert into voucher_reset_marks (year_month, claimed_at_utc)
            values ($1, $2)
            on conflict (year_month) do nothing
            "#,
        )
        .bind(month.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .context("claim_month failed")?;

        Ok(res.rows_affected() == 1)
    }
}

/// Per-user reset: stamps `voucher_reset_at` on the user's food-voucher cards
/// and records the `(user, month)` pair. Re-running for the same pair only
/// refreshes the stamp.
#[derive(Clone)]
pub struct PgVoucherResetter {
    pool: PgPool,
}

impl PgVoucherResetter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl VoucherResetter for PgVoucherResetter {
    async fn reset_user(&self, user_id: UserId, month: YearMonth) -> Result<()> {
        let mut tx = self.pool.begin().await.context("reset_user begin failed")?;

        let cards = sqlx::query(
            r#"
            update cards
            set voucher_reset_at = now()
            where user_id = $1 and kind = 'FOOD_VOUCHER'
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("reset_user card stamp failed")?
        .rows_affected();

        sqlx::query(
            r#"
            insert into voucher_user_resets (user_id, year_month)
            values ($1, $2)
            on conflict (user_id, year_month) do update set reset_at_utc = now()
            "#,
        )
        .bind(user_id)
        .bind(month.to_string())
        .execute(&mut *tx)
        .await
        .context("reset_user record failed")?;

        tx.commit().await.context("reset_user commit failed")?;

        tracing::debug!(user_id = %user_id, month = %month, cards, "voucher reset applied");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResetRow {
    pub user_id: UserId,
    pub year_month: String,
    pub reset_at_utc: DateTime<Utc>,
}

/// Users reset for `month`, oldest first.
pub async fn list_user_resets(pool: &PgPool, month: YearMonth) -> Result<Vec<UserResetRow>> {
    let rows: Vec<(UserId, String, DateTime<Utc>)> = sqlx::query_as(
        r#"
        select user_id, year_month, reset_at_utc
        from voucher_user_resets
        where year_month = $1
        order by reset_at_utc, user_id
        "#,
    )
    .bind(month.to_string())
    .fetch_all(pool)
    .await
    .context("list_user_resets failed")?;

    Ok(rows
        .into_iter()
        .map(|(user_id, year_month, reset_at_utc)| UserResetRow {
            user_id,
            year_month,
            reset_at_utc,
        })
        .collect())
}
