//! Store seams.
//!
//! The relational store and the per-user voucher reset live outside this
//! crate. Implementations return `anyhow::Result`; the services convert any
//! failure into [`crate::ReconcileError::StorageFailure`].

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{
    calendar::YearMonth,
    types::{Card, CardId, CardKind, CategoryId, LedgerEntry, NewLedgerEntry, UserId},
};

/// Closed time window `[start, end]` used by the ledger query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>>;

    async fn list_cards(&self) -> Result<Vec<Card>>;

    /// Entries of `card_id` inside `window` that count against the limit:
    /// every expense, plus credits booked to `adjustment_category`.
    async fn query_qualifying_entries(
        &self,
        card_id: CardId,
        window: PeriodWindow,
        adjustment_category: CategoryId,
    ) -> Result<Vec<LedgerEntry>>;

    async fn create_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry>;

    async fn list_food_voucher_card_owners(&self) -> Result<BTreeSet<UserId>>;

    async fn update_card_classification(&self, card_id: CardId, kind: CardKind) -> Result<Card>;

    /// Look up a category by name, creating it when absent. Called once at setup.
    async fn ensure_category(&self, name: &str) -> Result<CategoryId>;
}

/// Opaque per-user voucher reset, invoked once per user per pass.
#[async_trait::async_trait]
pub trait VoucherResetter: Send + Sync {
    async fn reset_user(&self, user_id: UserId, month: YearMonth) -> Result<()>;
}

/// Record of which calendar month the reset pass last ran for.
#[async_trait::async_trait]
pub trait ResetMarkerStore: Send + Sync {
    async fn last_reset_month(&self) -> Result<Option<YearMonth>>;

    /// Mark `month` as done. Returns `false` when it was already marked, so
    /// only one caller can win a given month.
    async fn claim_month(&self, month: YearMonth, at: DateTime<Utc>) -> Result<bool>;
}
