//! Persisted reset marker: a month can be claimed exactly once.
//!
//! DB-backed test, skipped if PFM_DATABASE_URL is not set. Uses a far-future
//! month derived from a fresh UUID and deletes its rows afterwards.

use chrono::Utc;
use pfm_db::{PgResetMarker, PgVoucherResetter};
use pfm_reconcile::{ResetMarkerStore, VoucherResetter, YearMonth};
use uuid::Uuid;

fn scratch_month() -> YearMonth {
    let n = Uuid::new_v4().as_u128();
    let year = 2100 + (n % 700) as i32;
    let month = 1 + ((n / 700) % 12) as u32;
    YearMonth::new(year, month).unwrap()
}

#[tokio::test]
async fn month_claimed_once_across_markers() -> anyhow::Result<()> {
    let url = match std::env::var(pfm_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: PFM_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = pfm_db::connect(&url).await?;
    pfm_db::migrate(&pool).await?;

    let month = scratch_month();
    // Two markers model two daemon processes on one database.
    let a = PgResetMarker::new(pool.clone());
    let b = PgResetMarker::new(pool.clone());

    let (won_a, won_b) = tokio::join!(a.claim_month(month, Utc::now()), b.claim_month(month, Utc::now()));
    assert!(won_a? ^ won_b?, "exactly one claimer must win");
    assert!(!a.claim_month(month, Utc::now()).await?);

    let last = a.last_reset_month().await?.expect("at least one month marked");
    assert!(last >= month);

    let user = Uuid::new_v4();
    let resetter = PgVoucherResetter::new(pool.clone());
    resetter.reset_user(user, month).await?;
    resetter.reset_user(user, month).await?;
    let rows = pfm_db::list_user_resets(&pool, month).await?;
    assert_eq!(rows.iter().filter(|r| r.user_id == user).count(), 1);

    sqlx::query("delete from voucher_user_resets where year_month = $1")
        .bind(month.to_string())
        .execute(&pool)
        .await?;
    sqlx::query("delete from voucher_reset_marks where year_month = $1")
        .bind(month.to_string())
        .execute(&pool)
        .await?;
    Ok(())
}
