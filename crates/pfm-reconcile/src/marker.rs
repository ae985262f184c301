use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{calendar::YearMonth, store::ResetMarkerStore};

/// Process-lifetime reset marker.
///
/// Lost on restart: a restart on day 1 lets the next trigger run the pass
/// again. Use the Postgres marker for exactly-once across restarts.
#[derive(Debug, Default)]
pub struct InMemoryResetMarker {
    last: Mutex<Option<YearMonth>>,
}

impl InMemoryResetMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last(month: YearMonth) -> Self {
        Self {
            last: Mutex::new(Some(month)),
        }
    }
}

#[async_trait::async_trait]
impl ResetMarkerStore for InMemoryResetMarker {
    async fn last_reset_month(&self) -> Result<Option<YearMonth>> {
        Ok(*self.last.lock().unwrap_or_else(|p| p.into_inner()))
    }

    async fn claim_month(&self, month: YearMonth, _at: DateTime<Utc>) -> Result<bool> {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if *last == Some(month) {
            return Ok(false);
        }
        *last = Some(month);
        Ok(true)
    }
}
