use anyhow::Result;
use chrono::Utc;
use pfm_reconcile::{ResetMarkerStore, ResetOutcome, YearMonth};

use super::{engine_err, parse_at, print_json, Ctx};

/// Run one reset pass. `require` turns a guarded skip into a failing exit.
pub async fn run(ctx: &Ctx, at: Option<&str>, require: bool) -> Result<()> {
    let now = parse_at(at)?;
    let engine = ctx.engine().await?;
    let outcome = engine
        .scheduler
        .run_reset_pass(now)
        .await
        .map_err(engine_err)?;

    if let ResetOutcome::Skipped { month, reason } = &outcome {
        println!("skipped=true month={} reason={}", month, reason.as_str());
        if require {
            outcome.require_completed().map_err(engine_err)?;
        }
        return Ok(());
    }
    print_json(&outcome)
}

/// Print the marker and the users recorded for `month` (default: current month).
pub async fn status(ctx: &Ctx, month: Option<&str>) -> Result<()> {
    let month: YearMonth = match month {
        Some(m) => m.parse().map_err(engine_err)?,
        None => ctx.calendar()?.year_month(Utc::now()),
    };

    let marker = pfm_db::PgResetMarker::new(ctx.pool.clone());
    let last = marker.last_reset_month().await?;
    let users = pfm_db::list_user_resets(&ctx.pool, month).await?;

    println!(
        "last_reset_month={}",
        last.map(|m| m.to_string()).unwrap_or_default()
    );
    println!("month={} users_reset={}", month, users.len());
    for u in &users {
        println!("user_id={} reset_at_utc={}", u.user_id, u.reset_at_utc.to_rfc3339());
    }
    Ok(())
}
