//! pfm-testkit
//!
//! In-memory fakes for the store seams of `pfm-reconcile`, plus a harness
//! that wires the full engine over them. Used by scenario tests only.

mod ledger;
mod resetter;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pfm_reconcile::{
    AdjustmentEmitter, BillingCalendar, CardNormalizer, CategoryId, Engine, EngineSettings,
    InMemoryResetMarker, LimitReconciler, VoucherResetScheduler,
};
use rust_decimal::Decimal;

pub use ledger::InMemoryLedger;
pub use resetter::RecordingResetter;

pub const ADJUSTMENT_CATEGORY: &str = pfm_reconcile::DEFAULT_ADJUSTMENT_CATEGORY;

/// Parse a decimal literal. Panics on malformed input (test helper).
pub fn dec(s: &str) -> Decimal {
    s.parse()
        .unwrap_or_else(|e| panic!("bad decimal literal {s:?}: {e}"))
}

/// Parse an RFC 3339 timestamp into UTC. Panics on malformed input (test helper).
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap_or_else(|e| panic!("bad timestamp {s:?}: {e}"))
        .with_timezone(&Utc)
}

/// The whole engine wired over in-memory fakes.
pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub resetter: Arc<RecordingResetter>,
    pub marker: Arc<InMemoryResetMarker>,
    pub calendar: BillingCalendar,
    pub adjustment_category: CategoryId,
    pub engine: Engine,
    pub reconciler: LimitReconciler,
    pub emitter: Arc<AdjustmentEmitter>,
    pub scheduler: Arc<VoucherResetScheduler>,
    pub normalizer: Arc<CardNormalizer>,
}

impl Harness {
    pub async fn new() -> Result<Self> {
        Self::with_settings(EngineSettings::default()).await
    }

    pub async fn with_calendar(calendar: BillingCalendar) -> Result<Self> {
        Self::with_settings(EngineSettings {
            calendar,
            ..EngineSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: EngineSettings) -> Result<Self> {
        let ledger = Arc::new(InMemoryLedger::new());
        let resetter = Arc::new(RecordingResetter::new());
        let marker = Arc::new(InMemoryResetMarker::new());

        let engine = Engine::build(
            ledger.clone(),
            resetter.clone(),
            marker.clone(),
            settings,
        )
        .await
        .context("wire engine over in-memory fakes")?;

        Ok(Self {
            ledger,
            resetter,
            marker,
            calendar: engine.calendar,
            adjustment_category: engine.adjustment_category,
            reconciler: engine.reconciler.clone(),
            emitter: Arc::clone(&engine.emitter),
            scheduler: Arc::clone(&engine.scheduler),
            normalizer: Arc::clone(&engine.normalizer),
            engine,
        })
    }
}
