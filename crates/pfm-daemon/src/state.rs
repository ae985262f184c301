//! Shared runtime state for pfm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The engine components
//! are internally synchronized, so nothing here needs an outer lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pfm_reconcile::{CardId, Engine, EntryId, ReconcileError, ResetOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    /// A reset pass that actually ran. Skips are not broadcast.
    ResetPass(ResetOutcome),
    Adjustment {
        card_id: CardId,
        entry_id: EntryId,
        drift: Decimal,
        available: Decimal,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::ResetPass(_) => "reset_pass",
            BusMsg::Adjustment { .. } => "adjustment",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Source of "now". Production uses the wall clock; tests pin it.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Startup options that are not part of the engine itself.
#[derive(Clone, Default)]
pub struct DaemonOptions {
    /// Shared secret for the manual trigger routes. `None` keeps them closed.
    pub reset_secret: Option<String>,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: Engine,
    pub reset_secret: Option<String>,
    pub config_hash: String,
    pub clock: Clock,
}

impl AppState {
    pub fn new(engine: Engine, opts: DaemonOptions) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "pfm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine,
            reset_secret: opts.reset_secret.filter(|s| !s.trim().is_empty()),
            config_hash: opts.config_hash,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run one reset pass at the current clock time and publish the result.
    ///
    /// `trigger` is "tick" or "manual" and only appears in logs.
    pub async fn run_reset(&self, trigger: &'static str) -> Result<ResetOutcome, ReconcileError> {
        let now = self.now();
        let outcome = self.engine.scheduler.run_reset_pass(now).await?;
        match &outcome {
            ResetOutcome::Skipped { month, reason } => {
                debug!(trigger, %month, reason = reason.as_str(), "voucher reset skipped");
            }
            ResetOutcome::Completed(report) => {
                info!(
                    trigger,
                    month = %report.month,
                    users = report.users.len(),
                    failed = report.failed(),
                    "voucher reset pass completed"
                );
                let _ = self.bus.send(BusMsg::ResetPass(outcome.clone()));
                if report.failed() > 0 {
                    let _ = self.bus.send(BusMsg::LogLine {
                        level: "WARN".to_string(),
                        msg: format!(
                            "voucher reset {}: {} of {} user(s) failed",
                            report.month,
                            report.failed(),
                            report.users.len()
                        ),
                    });
                }
            }
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the voucher reset timer.
///
/// The first tick fires immediately, so a daemon started on the 1st catches
/// up without waiting a full interval. The scheduler's guard makes every
/// other tick in the month a cheap no-op. A failed pass is logged and retried
/// on the next tick; the task itself never exits.
pub fn spawn_reset_tick(state: Arc<AppState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = state.run_reset("tick").await {
                warn!(error = %e, kind = e.kind().as_str(), "voucher reset tick failed");
                let _ = state.bus.send(BusMsg::LogLine {
                    level: "ERROR".to_string(),
                    msg: format!("voucher reset tick failed: {e}"),
                });
            }
        }
    })
}
