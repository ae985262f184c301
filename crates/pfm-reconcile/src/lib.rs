//! pfm-reconcile
//!
//! Card limit reconciliation and food-voucher reset engine.
//!
//! - Available limit is a pure function of ledger history; it is never stored.
//! - Drift between a declared and a computed available limit is absorbed by a
//!   single synthetic ledger entry.
//! - The voucher reset pass runs at most once per calendar month.
//!
//! Persistence and the per-user reset operation sit behind the traits in
//! [`store`]; this crate performs no IO of its own.

pub mod adjust;
pub mod calendar;
pub mod engine;
mod error;
pub mod ledger;
pub mod limit;
pub mod marker;
pub mod normalize;
pub mod reset;
pub mod store;
mod types;

pub use adjust::{AdjustmentEmitter, AdjustmentResult, ReconcileCommand, DEFAULT_EPSILON};
pub use calendar::{BillingCalendar, YearMonth};
pub use engine::{Engine, EngineSettings, DEFAULT_ADJUSTMENT_CATEGORY};
pub use error::{ErrorKind, ReconcileError};
pub use ledger::LedgerQuery;
pub use limit::{available_from_entries, used_limit, AvailableLimit, LimitReconciler};
pub use marker::InMemoryResetMarker;
pub use normalize::{normalize, CardNormalizer, NormalizeReport};
pub use reset::{
    ResetOutcome, ResetPassReport, SchedulerState, SchedulerStatus, SkipReason,
    VoucherResetScheduler,
};
pub use store::{LedgerStore, PeriodWindow, ResetMarkerStore, VoucherResetter};
pub use types::*;
