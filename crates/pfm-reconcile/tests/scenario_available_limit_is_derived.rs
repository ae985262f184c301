//! Scenario: available limit is a pure function of ledger history.
//!
//! # Invariants under test
//!
//! 1. A card with no qualifying entries reports its full limit.
//! 2. Only expenses inside `[period_start, now]` count; earlier months,
//!    future-dated entries, other cards and income do not.
//! 3. Unknown cards surface `NotFound`; foreign cards surface `Unauthorized`.
//! 4. Store read failures surface as `StorageFailure`.

use pfm_reconcile::{CardKind, ErrorKind};
use pfm_testkit::{at, dec, Harness};
use uuid::Uuid;

#[tokio::test]
async fn card_without_entries_reports_full_limit() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let card = h
        .ledger
        .add_card(Uuid::new_v4(), "Gold", dec("1000"), CardKind::Credit);

    let available = h
        .reconciler
        .compute_available(&card, at("2026-10-19T12:00:00Z"))
        .await?;
    assert_eq!(available, dec("1000"));
    Ok(())
}

#[tokio::test]
async fn two_expenses_this_month_leave_650() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let card = h
        .ledger
        .add_card(Uuid::new_v4(), "Gold", dec("1000"), CardKind::Credit);
    h.ledger
        .book(Some(card.id), dec("-200"), at("2026-10-03T10:00:00Z"), None);
    h.ledger
        .book(Some(card.id), dec("-150"), at("2026-10-11T18:30:00Z"), None);

    let report = h
        .reconciler
        .report(&card, at("2026-10-19T12:00:00Z"))
        .await?;
    assert_eq!(report.used, dec("350"));
    assert_eq!(report.available, dec("650"));
    assert_eq!(report.period_start, at("2026-10-01T00:00:00Z"));
    Ok(())
}

#[tokio::test]
async fn entries_outside_window_or_card_are_ignored() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let user = Uuid::new_v4();
    let card = h.ledger.add_card(user, "Gold", dec("1000"), CardKind::Credit);
    let other = h.ledger.add_card(user, "Silver", dec("500"), CardKind::Credit);

    // Last month.
    h.ledger
        .book(Some(card.id), dec("-400"), at("2026-09-30T23:59:59Z"), None);
    // After `now`.
    h.ledger
        .book(Some(card.id), dec("-90"), at("2026-10-20T00:00:00Z"), None);
    // Another card and a card-less entry.
    h.ledger
        .book(Some(other.id), dec("-75"), at("2026-10-05T00:00:00Z"), None);
    h.ledger.book(None, dec("-60"), at("2026-10-05T00:00:00Z"), None);
    // Income on the card does not give limit back.
    h.ledger
        .book(Some(card.id), dec("300"), at("2026-10-06T00:00:00Z"), None);
    // Exactly at period start counts.
    h.ledger
        .book(Some(card.id), dec("-10.50"), at("2026-10-01T00:00:00Z"), None);

    let available = h
        .reconciler
        .compute_available(&card, at("2026-10-19T12:00:00Z"))
        .await?;
    assert_eq!(available, dec("989.50"));
    Ok(())
}

#[tokio::test]
async fn over_limit_is_representable() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let card = h
        .ledger
        .add_card(Uuid::new_v4(), "Gold", dec("100"), CardKind::Credit);
    h.ledger
        .book(Some(card.id), dec("-130.25"), at("2026-10-02T09:00:00Z"), None);

    let available = h
        .reconciler
        .compute_available(&card, at("2026-10-19T12:00:00Z"))
        .await?;
    assert_eq!(available, dec("-30.25"));
    Ok(())
}

#[tokio::test]
async fn unknown_card_is_not_found() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let err = h
        .reconciler
        .available_for(Uuid::new_v4(), Uuid::new_v4(), at("2026-10-19T12:00:00Z"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .reconciler
        .query()
        .expense_entries(
            Uuid::new_v4(),
            at("2026-10-01T00:00:00Z"),
            at("2026-10-19T12:00:00Z"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn foreign_card_is_unauthorized() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let card = h
        .ledger
        .add_card(Uuid::new_v4(), "Gold", dec("1000"), CardKind::Credit);

    let err = h
        .reconciler
        .available_for(Uuid::new_v4(), card.id, at("2026-10-19T12:00:00Z"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let ok = h
        .reconciler
        .available_for(card.user_id, card.id, at("2026-10-19T12:00:00Z"))
        .await?;
    assert_eq!(ok.available, dec("1000"));
    Ok(())
}

#[tokio::test]
async fn read_failure_propagates_as_storage_failure() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let card = h
        .ledger
        .add_card(Uuid::new_v4(), "Gold", dec("1000"), CardKind::Credit);
    h.ledger.set_fail_reads(true);

    let err = h
        .reconciler
        .compute_available(&card, at("2026-10-19T12:00:00Z"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(err.to_string().contains("read failure injected"));
    Ok(())
}
