//! Ledger query: the read side of reconciliation.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    store::{LedgerStore, PeriodWindow},
    types::{Card, CardId, CategoryId, LedgerEntry},
    ReconcileError,
};

#[derive(Clone)]
pub struct LedgerQuery {
    store: Arc<dyn LedgerStore>,
    adjustment_category: CategoryId,
}

impl LedgerQuery {
    pub fn new(store: Arc<dyn LedgerStore>, adjustment_category: CategoryId) -> Self {
        Self {
            store,
            adjustment_category,
        }
    }

    pub fn adjustment_category(&self) -> CategoryId {
        self.adjustment_category
    }

    pub async fn load_card(&self, card_id: CardId) -> Result<Card, ReconcileError> {
        self.store
            .fetch_card(card_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("card {card_id}")))
    }

    /// Qualifying entries of `card_id` in `[period_start, now]`.
    ///
    /// Fails with `NotFound` if the card does not resolve. No ordering is
    /// guaranteed.
    pub async fn expense_entries(
        &self,
        card_id: CardId,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, ReconcileError> {
        let card = self.load_card(card_id).await?;
        self.entries_for(&card, period_start, now).await
    }

    /// Same as [`Self::expense_entries`] for a card already in hand.
    pub async fn entries_for(
        &self,
        card: &Card,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, ReconcileError> {
        if period_start > now {
            return Err(ReconcileError::InvalidInput(format!(
                "period start {period_start} is after {now}"
            )));
        }
        let window = PeriodWindow {
            start: period_start,
            end: now,
        };
        let entries = self
            .store
            .query_qualifying_entries(card.id, window, self.adjustment_category)
            .await?;
        tracing::debug!(card_id = %card.id, n = entries.len(), "ledger query");
        Ok(entries)
    }
}
