//! `pfm card available|reconcile` against Postgres.
//!
//! DB-backed test, skipped if PFM_DATABASE_URL is not set.

use assert_cmd::Command;
use chrono::{DateTime, Utc};
use pfm_reconcile::{Card, CardKind, EntryKind, LedgerStore, NewLedgerEntry};
use predicates::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn cli_reports_and_reconciles_available_limit() -> anyhow::Result<()> {
    let url = match std::env::var(pfm_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: PFM_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = pfm_db::connect(&url).await?;
    pfm_db::migrate(&pool).await?;
    let store = pfm_db::PgLedgerStore::new(pool.clone());

    let card = Card::new(Uuid::new_v4(), "Platinum", dec("1000"), CardKind::Credit)?;
    pfm_db::insert_card(&pool, &card).await?;
    for (amount, when) in [("-200", "2026-10-03T10:00:00Z"), ("-150", "2026-10-11T18:30:00Z")] {
        store
            .create_ledger_entry(&NewLedgerEntry {
                id: Uuid::new_v4(),
                card_id: Some(card.id),
                amount: dec(amount),
                occurred_at: at(when),
                kind: EntryKind::Single,
                category_id: None,
                description: "groceries".to_string(),
            })
            .await?;
    }

    let card_id = card.id.to_string();
    let user_id = card.user_id.to_string();
    let now = "2026-10-19T12:00:00Z";

    Command::cargo_bin("pfm")?
        .env_remove("PFM_CONFIG")
        .args(["card", "available", "--card", &card_id, "--user", &user_id, "--at", now])
        .assert()
        .success()
        .stdout(predicate::str::contains("available=650"));

    Command::cargo_bin("pfm")?
        .env_remove("PFM_CONFIG")
        .args([
            "card", "reconcile", "--card", &card_id, "--user", &user_id, "--declared", "600",
            "--at", now,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("adjusted=true"))
        .stdout(predicate::str::contains("amount=-50"));

    // A second identical request is a no-op.
    Command::cargo_bin("pfm")?
        .env_remove("PFM_CONFIG")
        .args([
            "card", "reconcile", "--card", &card_id, "--user", &user_id, "--declared", "600",
            "--at", now,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("adjusted=false available=600"));

    // Someone else's card.
    let stranger = Uuid::new_v4().to_string();
    Command::cargo_bin("pfm")?
        .env_remove("PFM_CONFIG")
        .args(["card", "available", "--card", &card_id, "--user", &stranger, "--at", now])
        .assert()
        .failure()
        .stderr(predicate::str::contains("UNAUTHORIZED"));

    Ok(())
}
