use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{bail, Result};
use pfm_reconcile::{UserId, VoucherResetter, YearMonth};

#[derive(Default)]
struct Plan {
    failing: HashSet<UserId>,
    hanging: HashSet<UserId>,
    delay: Option<Duration>,
}

/// Voucher resetter that records every call.
///
/// Users can be scripted to fail or to hang forever (exercises the per-user
/// timeout). An optional delay widens race windows in concurrency tests.
#[derive(Default)]
pub struct RecordingResetter {
    calls: Mutex<Vec<(UserId, YearMonth)>>,
    plan: Mutex<Plan>,
}

impl RecordingResetter {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan(&self) -> MutexGuard<'_, Plan> {
        self.plan.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn fail_for(&self, user_id: UserId) {
        self.plan().failing.insert(user_id);
    }

    pub fn hang_for(&self, user_id: UserId) {
        self.plan().hanging.insert(user_id);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.plan().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<(UserId, YearMonth)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl VoucherResetter for RecordingResetter {
    async fn reset_user(&self, user_id: UserId, month: YearMonth) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((user_id, month));

        let (fail, hang, delay) = {
            let plan = self.plan();
            (
                plan.failing.contains(&user_id),
                plan.hanging.contains(&user_id),
                plan.delay,
            )
        };

        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            bail!("scripted voucher reset failure for {user_id}");
        }
        Ok(())
    }
}
