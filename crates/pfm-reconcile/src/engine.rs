//! One-stop wiring of the five components over a set of stores.

use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use tracing::info;

use crate::{
    adjust::{AdjustmentEmitter, DEFAULT_EPSILON},
    calendar::BillingCalendar,
    ledger::LedgerQuery,
    limit::LimitReconciler,
    normalize::{CardNormalizer, DEFAULT_FOOD_VOUCHER_MARKER},
    reset::{VoucherResetScheduler, DEFAULT_PER_USER_TIMEOUT},
    store::{LedgerStore, ResetMarkerStore, VoucherResetter},
    types::CategoryId,
    ReconcileError,
};

pub const DEFAULT_ADJUSTMENT_CATEGORY: &str = "Limit adjustment";

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub calendar: BillingCalendar,
    pub epsilon: Decimal,
    /// Name of the reserved category; resolved to an id once, in [`Engine::build`].
    pub adjustment_category: String,
    pub per_user_timeout: Duration,
    pub food_voucher_marker: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            calendar: BillingCalendar::utc(),
            epsilon: DEFAULT_EPSILON,
            adjustment_category: DEFAULT_ADJUSTMENT_CATEGORY.to_string(),
            per_user_timeout: DEFAULT_PER_USER_TIMEOUT,
            food_voucher_marker: DEFAULT_FOOD_VOUCHER_MARKER.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    pub calendar: BillingCalendar,
    pub adjustment_category: CategoryId,
    pub reconciler: LimitReconciler,
    pub emitter: Arc<AdjustmentEmitter>,
    pub scheduler: Arc<VoucherResetScheduler>,
    pub normalizer: Arc<CardNormalizer>,
}

impl Engine {
    pub async fn build(
        store: Arc<dyn LedgerStore>,
        resetter: Arc<dyn VoucherResetter>,
        marker: Arc<dyn ResetMarkerStore>,
        settings: EngineSettings,
    ) -> Result<Self, ReconcileError> {
        let name = settings.adjustment_category.trim();
        if name.is_empty() {
            return Err(ReconcileError::InvalidInput(
                "adjustment category name must not be blank".to_string(),
            ));
        }
        let adjustment_category = store.ensure_category(name).await?;
        info!(category = name, category_id = %adjustment_category, "adjustment category ready");

        let calendar = settings.calendar;
        let reconciler = LimitReconciler::new(
            LedgerQuery::new(Arc::clone(&store), adjustment_category),
            calendar,
        );
        let emitter = Arc::new(AdjustmentEmitter::new(
            Arc::clone(&store),
            reconciler.clone(),
            settings.epsilon,
        ));
        let scheduler = Arc::new(
            VoucherResetScheduler::new(Arc::clone(&store), resetter, marker, calendar)
                .with_per_user_timeout(settings.per_user_timeout),
        );
        let normalizer = Arc::new(CardNormalizer::new(store, settings.food_voucher_marker));

        Ok(Self {
            calendar,
            adjustment_category,
            reconciler,
            emitter,
            scheduler,
            normalizer,
        })
    }
}
