//! Adjustment emitter.
//!
//! Absorbs drift between a user-declared available limit and the computed one
//! by writing a single synthetic ledger entry in the reserved adjustment
//! category. At most one entry per call; the write is the only side effect.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    limit::{ensure_owner, LimitReconciler},
    store::LedgerStore,
    types::{Card, CardId, EntryKind, LedgerEntry, NewLedgerEntry, UserId},
    ReconcileError,
};

/// Drift at or below this magnitude is treated as no drift (0.01 currency units).
pub const DEFAULT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub const ADJUSTMENT_DESCRIPTION: &str = "Available limit adjustment";

/// Validated reconcile request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileCommand {
    pub caller: UserId,
    pub card_id: CardId,
    pub declared_available: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdjustmentResult {
    /// Drift within epsilon; nothing written.
    Unchanged {
        card_id: CardId,
        available: Decimal,
        drift: Decimal,
    },
    Adjusted {
        card_id: CardId,
        entry: LedgerEntry,
        /// computed - declared, before the adjustment.
        drift: Decimal,
        previous_available: Decimal,
        available: Decimal,
    },
}

impl AdjustmentResult {
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            AdjustmentResult::Unchanged { .. } => None,
            AdjustmentResult::Adjusted { entry, .. } => Some(entry),
        }
    }

    pub fn available(&self) -> Decimal {
        match self {
            AdjustmentResult::Unchanged { available, .. }
            | AdjustmentResult::Adjusted { available, .. } => *available,
        }
    }

    pub fn is_adjusted(&self) -> bool {
        self.entry().is_some()
    }
}

pub struct AdjustmentEmitter {
    store: Arc<dyn LedgerStore>,
    reconciler: LimitReconciler,
    epsilon: Decimal,
    // Serializes read-then-write per card within this process.
    card_locks: Mutex<HashMap<CardId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AdjustmentEmitter {
    pub fn new(store: Arc<dyn LedgerStore>, reconciler: LimitReconciler, epsilon: Decimal) -> Self {
        Self {
            store,
            reconciler,
            epsilon: epsilon.abs(),
            card_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    pub fn reconciler(&self) -> &LimitReconciler {
        &self.reconciler
    }

    fn card_lock(&self, card_id: CardId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.card_locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(card_id).or_default())
    }

    /// Drop the map entry once no other call holds or waits on it.
    fn release_card_lock(&self, card_id: CardId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.card_locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(lock);
        if locks
            .get(&card_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&card_id);
        }
    }

    /// Cards with a live lock entry.
    pub fn tracked_card_locks(&self) -> usize {
        self.card_locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub async fn reconcile(
        &self,
        cmd: &ReconcileCommand,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentResult, ReconcileError> {
        let card = self.reconciler.query().load_card(cmd.card_id).await?;
        ensure_owner(&card, cmd.caller)?;

        if cmd.declared_available > card.limit {
            return Err(ReconcileError::InvalidInput(format!(
                "declared available exceeds total limit ({} > {})",
                cmd.declared_available, card.limit
            )));
        }

        let lock = self.card_lock(card.id);
        let held = lock.lock().await;
        let result = self.reconcile_locked(&card, cmd, now).await;
        drop(held);
        self.release_card_lock(card.id, lock);
        result
    }

    async fn reconcile_locked(
        &self,
        card: &Card,
        cmd: &ReconcileCommand,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentResult, ReconcileError> {
        let computed = self.reconciler.compute_available(card, now).await?;
        let drift = computed - cmd.declared_available;

        if drift.abs() <= self.epsilon {
            return Ok(AdjustmentResult::Unchanged {
                card_id: card.id,
                available: computed,
                drift,
            });
        }

        // Positive drift means more limit is free than the user sees: consume it
        // with an expense. Negative drift books a credit in the same category
        // instead of an expense, and the ledger query counts adjustment credits,
        // so the next computation lands on the declared value. Recorded as
        // decision 2 under "Open question decisions" in DESIGN.md.
        let amount = if drift.is_sign_positive() {
            -drift.abs()
        } else {
            drift.abs()
        };

        let new_entry = NewLedgerEntry {
            id: Uuid::new_v4(),
            card_id: Some(card.id),
            amount,
            occurred_at: now,
            kind: EntryKind::Single,
            category_id: Some(self.reconciler.query().adjustment_category()),
            description: ADJUSTMENT_DESCRIPTION.to_string(),
        };
        let entry = self.store.create_ledger_entry(&new_entry).await?;

        info!(
            card_id = %card.id,
            user_id = %card.user_id,
            %drift,
            %amount,
            "limit adjustment recorded"
        );

        Ok(AdjustmentResult::Adjusted {
            card_id: card.id,
            entry,
            drift,
            previous_available: computed,
            available: computed - drift,
        })
    }
}
