//! Card type normalizer.
//!
//! Cards whose name carries the food-voucher marker are classified as
//! food-voucher. A food-voucher card is never moved back to credit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    store::LedgerStore,
    types::{Card, CardId, CardKind},
    ReconcileError,
};

pub const DEFAULT_FOOD_VOUCHER_MARKER: &str = "voucher";

/// Corrected classification for `card`. Marker match is case-insensitive.
pub fn normalize(card: &Card, marker: &str) -> CardKind {
    let marker = marker.trim();
    let tagged = !marker.is_empty()
        && card
            .name
            .to_lowercase()
            .contains(&marker.to_lowercase());
    if tagged || card.kind == CardKind::FoodVoucher {
        CardKind::FoodVoucher
    } else {
        card.kind
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFailure {
    pub card_id: CardId,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub scanned: usize,
    /// Cards whose classification changed.
    pub reclassified: Vec<CardId>,
    pub failures: Vec<CardFailure>,
}

pub struct CardNormalizer {
    store: Arc<dyn LedgerStore>,
    marker: String,
}

impl CardNormalizer {
    pub fn new(store: Arc<dyn LedgerStore>, marker: impl Into<String>) -> Self {
        Self {
            store,
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Write the corrected kind back for every card, changed or not.
    ///
    /// Listing cards failing aborts; a single card's write failing is recorded
    /// and the batch continues.
    pub async fn normalize_all(&self) -> Result<NormalizeReport, ReconcileError> {
        let cards = self.store.list_cards().await?;
        let mut report = NormalizeReport {
            scanned: cards.len(),
            ..NormalizeReport::default()
        };

        for card in &cards {
            let corrected = normalize(card, &self.marker);
            match self.store.update_card_classification(card.id, corrected).await {
                Ok(_) => {
                    if corrected != card.kind {
                        info!(
                            card_id = %card.id,
                            from = card.kind.as_str(),
                            to = corrected.as_str(),
                            "card reclassified"
                        );
                        report.reclassified.push(card.id);
                    }
                }
                Err(e) => {
                    warn!(card_id = %card.id, error = %format!("{e:#}"), "card normalization write failed");
                    report.failures.push(CardFailure {
                        card_id: card.id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn card(name: &str, kind: CardKind) -> Card {
        Card::new(Uuid::new_v4(), name, Decimal::from(500), kind).unwrap()
    }

    #[test]
    fn marker_in_name_marks_food_voucher() {
        let c = card("Company Voucher Card", CardKind::Credit);
        assert_eq!(normalize(&c, DEFAULT_FOOD_VOUCHER_MARKER), CardKind::FoodVoucher);
    }

    #[test]
    fn plain_credit_card_stays_credit() {
        let c = card("Platinum", CardKind::Credit);
        assert_eq!(normalize(&c, DEFAULT_FOOD_VOUCHER_MARKER), CardKind::Credit);
    }

    #[test]
    fn food_voucher_is_never_downgraded() {
        let c = card("Lunch card", CardKind::FoodVoucher);
        assert_eq!(normalize(&c, DEFAULT_FOOD_VOUCHER_MARKER), CardKind::FoodVoucher);
    }

    #[test]
    fn normalize_is_idempotent() {
        for (name, kind) in [
            ("voucher", CardKind::Credit),
            ("gold", CardKind::Credit),
            ("gold", CardKind::FoodVoucher),
        ] {
            let mut c = card(name, kind);
            let once = normalize(&c, DEFAULT_FOOD_VOUCHER_MARKER);
            c.kind = once;
            assert_eq!(normalize(&c, DEFAULT_FOOD_VOUCHER_MARKER), once);
        }
    }

    #[test]
    fn blank_marker_matches_nothing() {
        let c = card("anything", CardKind::Credit);
        assert_eq!(normalize(&c, "  "), CardKind::Credit);
    }
}
