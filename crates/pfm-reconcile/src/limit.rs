//! Limit reconciler.
//!
//! `available = limit - used`, where `used` is the sum of expense magnitudes
//! in the current billing period. Credits returned by the ledger query (only
//! adjustment credits qualify) give limit back. The result is recomputed on
//! every call and never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::BillingCalendar,
    ledger::LedgerQuery,
    types::{Card, CardId, LedgerEntry, UserId},
    ReconcileError,
};

/// Usage of the limit by a set of qualifying entries. Order-independent.
pub fn used_limit(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().fold(Decimal::ZERO, |acc, e| {
        if e.is_expense() {
            acc + e.amount.abs()
        } else {
            acc - e.amount.abs()
        }
    })
}

/// May be negative: over-limit is representable.
pub fn available_from_entries(limit: Decimal, entries: &[LedgerEntry]) -> Decimal {
    limit - used_limit(entries)
}

/// Ownership check shared by every user-facing operation.
pub fn ensure_owner(card: &Card, caller: UserId) -> Result<(), ReconcileError> {
    if card.user_id != caller {
        return Err(ReconcileError::Unauthorized(format!(
            "user {caller} does not own card {}",
            card.id
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableLimit {
    pub card_id: CardId,
    pub limit: Decimal,
    pub used: Decimal,
    pub available: Decimal,
    pub period_start: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LimitReconciler {
    query: LedgerQuery,
    calendar: BillingCalendar,
}

impl LimitReconciler {
    pub fn new(query: LedgerQuery, calendar: BillingCalendar) -> Self {
        Self { query, calendar }
    }

    pub fn calendar(&self) -> BillingCalendar {
        self.calendar
    }

    pub fn query(&self) -> &LedgerQuery {
        &self.query
    }

    pub async fn compute_available(
        &self,
        card: &Card,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ReconcileError> {
        Ok(self.report(card, now).await?.available)
    }

    pub async fn report(
        &self,
        card: &Card,
        now: DateTime<Utc>,
    ) -> Result<AvailableLimit, ReconcileError> {
        let period_start = self.calendar.period_start(now);
        let entries = self.query.entries_for(card, period_start, now).await?;
        let used = used_limit(&entries);
        Ok(AvailableLimit {
            card_id: card.id,
            limit: card.limit,
            used,
            available: card.limit - used,
            period_start,
            as_of: now,
        })
    }

    /// Resolve the card, check `caller` owns it, and report its available limit.
    pub async fn available_for(
        &self,
        caller: UserId,
        card_id: CardId,
        now: DateTime<Utc>,
    ) -> Result<AvailableLimit, ReconcileError> {
        let card = self.query.load_card(card_id).await?;
        ensure_owner(&card, caller)?;
        self.report(&card, now).await
    }
}
