//! Scenario: card type normalizer over the whole store.
//!
//! - Every card gets its classification written back, changed or not.
//! - One card failing to write does not stop the rest.
//! - Running twice changes nothing the second time.

use pfm_reconcile::{CardKind, ErrorKind};
use pfm_testkit::{dec, Harness};
use uuid::Uuid;

#[tokio::test]
async fn tagged_cards_become_food_voucher() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let user = Uuid::new_v4();
    let tagged = h
        .ledger
        .add_card(user, "Acme VOUCHER", dec("700"), CardKind::Credit);
    let plain = h.ledger.add_card(user, "Gold", dec("3000"), CardKind::Credit);
    let already = h
        .ledger
        .add_card(user, "Meal", dec("500"), CardKind::FoodVoucher);

    let report = h.normalizer.normalize_all().await?;
    assert_eq!(report.scanned, 3);
    assert_eq!(report.reclassified, vec![tagged.id]);
    assert!(report.failures.is_empty());
    assert_eq!(h.ledger.classification_writes(), 3);

    assert_eq!(h.ledger.card(tagged.id).unwrap().kind, CardKind::FoodVoucher);
    assert_eq!(h.ledger.card(plain.id).unwrap().kind, CardKind::Credit);
    assert_eq!(h.ledger.card(already.id).unwrap().kind, CardKind::FoodVoucher);
    Ok(())
}

#[tokio::test]
async fn second_run_is_a_no_op_but_still_writes() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let user = Uuid::new_v4();
    h.ledger
        .add_card(user, "voucher alpha", dec("700"), CardKind::Credit);
    h.ledger.add_card(user, "Gold", dec("3000"), CardKind::Credit);

    let first = h.normalizer.normalize_all().await?;
    assert_eq!(first.reclassified.len(), 1);

    let second = h.normalizer.normalize_all().await?;
    assert!(second.reclassified.is_empty());
    assert_eq!(h.ledger.classification_writes(), 4);
    Ok(())
}

#[tokio::test]
async fn one_failing_card_does_not_abort_batch() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let user = Uuid::new_v4();
    let broken = h
        .ledger
        .add_card(user, "voucher broken", dec("100"), CardKind::Credit);
    let fine = h
        .ledger
        .add_card(user, "voucher fine", dec("100"), CardKind::Credit);
    h.ledger.fail_classification_for(broken.id);

    let report = h.normalizer.normalize_all().await?;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].card_id, broken.id);
    assert_eq!(report.reclassified, vec![fine.id]);
    assert_eq!(h.ledger.card(broken.id).unwrap().kind, CardKind::Credit);
    Ok(())
}

#[tokio::test]
async fn listing_failure_is_fatal() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    h.ledger.set_fail_reads(true);
    let err = h.normalizer.normalize_all().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    Ok(())
}
