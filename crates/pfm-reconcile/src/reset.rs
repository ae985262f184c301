//! Voucher reset scheduler.
//!
//! A reset pass zeroes voucher usage for every owner of a food-voucher card,
//! at most once per calendar month.
//!
//! # State machine
//! `Idle -> ResetInFlight -> Idle`. The guard check and the pass run under a
//! single async mutex, so concurrent triggers in one process cannot both pass
//! the guard. The pass runs on a spawned task and cannot be aborted by a
//! caller that stops waiting. Across processes the marker's `claim_month` is the arbiter.
//!
//! # Guard
//! Day-of-month (billing timezone) is 1 AND the last reset month differs from
//! the current one.
//!
//! # Failure policy
//! - Enumerating owners fails: the month is NOT marked; a later trigger retries.
//! - A single user's reset fails or times out: recorded and logged, the pass
//!   continues, and the month stays marked. No retry within the month.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    calendar::{BillingCalendar, YearMonth},
    store::{LedgerStore, ResetMarkerStore, VoucherResetter},
    types::UserId,
    ReconcileError,
};

pub const DEFAULT_PER_USER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    ResetInFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFirstDay,
    AlreadyDone,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotFirstDay => "not_first_day",
            SkipReason::AlreadyDone => "already_done",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserResetStatus {
    Ok,
    Failed { error: String },
    TimedOut { after_ms: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResetResult {
    pub user_id: UserId,
    #[serde(flatten)]
    pub status: UserResetStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPassReport {
    pub month: YearMonth,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub users: Vec<UserResetResult>,
}

impl ResetPassReport {
    pub fn succeeded(&self) -> usize {
        self.users
            .iter()
            .filter(|u| u.status == UserResetStatus::Ok)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.users.len() - self.succeeded()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResetOutcome {
    Skipped { month: YearMonth, reason: SkipReason },
    Completed(ResetPassReport),
}

impl ResetOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ResetOutcome::Skipped { .. })
    }

    pub fn report(&self) -> Option<&ResetPassReport> {
        match self {
            ResetOutcome::Skipped { .. } => None,
            ResetOutcome::Completed(r) => Some(r),
        }
    }

    /// Turn a skip into [`ReconcileError::SkippedGuard`].
    pub fn require_completed(self) -> Result<ResetPassReport, ReconcileError> {
        match self {
            ResetOutcome::Completed(r) => Ok(r),
            ResetOutcome::Skipped { month, reason } => Err(ReconcileError::SkippedGuard(
                format!("month={month} reason={}", reason.as_str()),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub last_reset_month: Option<YearMonth>,
    pub last_report: Option<ResetPassReport>,
}

pub struct VoucherResetScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn LedgerStore>,
    resetter: Arc<dyn VoucherResetter>,
    marker: Arc<dyn ResetMarkerStore>,
    calendar: BillingCalendar,
    per_user_timeout: Duration,
    guard: Mutex<()>,
    // Never held across an await, so a drop guard can restore it.
    state: StdMutex<SchedulerState>,
    last_report: RwLock<Option<ResetPassReport>>,
}

impl Inner {
    fn set_state(&self, s: SchedulerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = s;
    }
}

/// Puts the scheduler back to `Idle` however the pass ends.
struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.set_state(SchedulerState::ResetInFlight);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set_state(SchedulerState::Idle);
    }
}

impl VoucherResetScheduler {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        resetter: Arc<dyn VoucherResetter>,
        marker: Arc<dyn ResetMarkerStore>,
        calendar: BillingCalendar,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                resetter,
                marker,
                calendar,
                per_user_timeout: DEFAULT_PER_USER_TIMEOUT,
                guard: Mutex::new(()),
                state: StdMutex::new(SchedulerState::Idle),
                last_report: RwLock::new(None),
            }),
        }
    }

    /// Must be called before the scheduler is shared.
    pub fn with_per_user_timeout(mut self, timeout: Duration) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.per_user_timeout = timeout,
            None => warn!("per-user timeout ignored: scheduler already shared"),
        }
        self
    }

    pub fn calendar(&self) -> BillingCalendar {
        self.inner.calendar
    }

    pub async fn state(&self) -> SchedulerState {
        *self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub async fn status(&self) -> Result<SchedulerStatus, ReconcileError> {
        Ok(SchedulerStatus {
            state: self.state().await,
            last_reset_month: self.inner.marker.last_reset_month().await?,
            last_report: self.inner.last_report.read().await.clone(),
        })
    }

    /// Run one guarded pass.
    ///
    /// The pass runs on its own task: dropping the returned future stops the
    /// wait, not the pass. Every enumerated user is still visited.
    pub async fn run_reset_pass(&self, now: DateTime<Utc>) -> Result<ResetOutcome, ReconcileError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.guarded_pass(now).await })
            .await
            .map_err(|e| ReconcileError::StorageFailure(format!("voucher reset task failed: {e}")))?
    }
}

impl Inner {
    async fn guarded_pass(&self, now: DateTime<Utc>) -> Result<ResetOutcome, ReconcileError> {
        let _guard = self.guard.lock().await;

        let month = self.calendar.year_month(now);
        if !self.calendar.is_first_day(now) {
            debug!(%month, "voucher reset skipped: not first day of month");
            return Ok(ResetOutcome::Skipped {
                month,
                reason: SkipReason::NotFirstDay,
            });
        }
        if self.marker.last_reset_month().await? == Some(month) {
            debug!(%month, "voucher reset skipped: month already done");
            return Ok(ResetOutcome::Skipped {
                month,
                reason: SkipReason::AlreadyDone,
            });
        }

        let outcome = {
            let _in_flight = InFlight::enter(self);
            self.run_pass(month, now).await
        };

        if let Ok(ResetOutcome::Completed(report)) = &outcome {
            *self.last_report.write().await = Some(report.clone());
        }
        outcome
    }

    async fn run_pass(
        &self,
        month: YearMonth,
        now: DateTime<Utc>,
    ) -> Result<ResetOutcome, ReconcileError> {
        let started = tokio::time::Instant::now();
        let owners = self.store.list_food_voucher_card_owners().await?;

        if !self.marker.claim_month(month, now).await? {
            info!(%month, "voucher reset skipped: month claimed elsewhere");
            return Ok(ResetOutcome::Skipped {
                month,
                reason: SkipReason::AlreadyDone,
            });
        }

        info!(%month, users = owners.len(), "voucher reset pass started");

        let mut users = Vec::with_capacity(owners.len());
        for user_id in owners {
            let status = match tokio::time::timeout(
                self.per_user_timeout,
                self.resetter.reset_user(user_id, month),
            )
            .await
            {
                Ok(Ok(())) => UserResetStatus::Ok,
                Ok(Err(e)) => {
                    warn!(%user_id, %month, error = %format!("{e:#}"), "voucher reset failed for user");
                    UserResetStatus::Failed {
                        error: format!("{e:#}"),
                    }
                }
                Err(_) => {
                    let after_ms = self.per_user_timeout.as_millis() as u64;
                    warn!(%user_id, %month, after_ms, "voucher reset timed out for user");
                    UserResetStatus::TimedOut { after_ms }
                }
            };
            users.push(UserResetResult { user_id, status });
        }

        let report = ResetPassReport {
            month,
            started_at: now,
            elapsed_ms: started.elapsed().as_millis() as u64,
            users,
        };
        info!(
            %month,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "voucher reset pass finished"
        );
        Ok(ResetOutcome::Completed(report))
    }
}
