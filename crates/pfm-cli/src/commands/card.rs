use anyhow::Result;
use pfm_reconcile::{AdjustmentResult, ReconcileCommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{engine_err, parse_at, print_json, Ctx};

pub async fn available(ctx: &Ctx, card: Uuid, user: Uuid, at: Option<&str>) -> Result<()> {
    let now = parse_at(at)?;
    let engine = ctx.engine().await?;
    let report = engine
        .reconciler
        .available_for(user, card, now)
        .await
        .map_err(engine_err)?;

    println!("card_id={}", report.card_id);
    println!("limit={}", report.limit);
    println!("used={}", report.used);
    println!("available={}", report.available);
    println!("period_start={}", report.period_start.to_rfc3339());
    Ok(())
}

pub async fn reconcile(
    ctx: &Ctx,
    card: Uuid,
    user: Uuid,
    declared: Decimal,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let now = parse_at(at)?;
    let engine = ctx.engine().await?;
    let cmd = ReconcileCommand {
        caller: user,
        card_id: card,
        declared_available: declared,
    };
    let result = engine.emitter.reconcile(&cmd, now).await.map_err(engine_err)?;

    if json {
        return print_json(&result);
    }
    match &result {
        AdjustmentResult::Unchanged {
            available, drift, ..
        } => {
            println!("adjusted=false available={} drift={}", available, drift);
        }
        AdjustmentResult::Adjusted {
            entry,
            drift,
            previous_available,
            available,
            ..
        } => {
            println!(
                "adjusted=true entry_id={} amount={} drift={} previous_available={} available={}",
                entry.id, entry.amount, drift, previous_available, available
            );
        }
    }
    Ok(())
}
