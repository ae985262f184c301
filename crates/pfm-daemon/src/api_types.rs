//! Request and response types for the pfm-daemon HTTP endpoints.
//!
//! No business logic lives here. Request bodies reject unknown fields so a
//! typo never silently falls back to a default.

use pfm_reconcile::{ErrorKind, SchedulerStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Header carrying the caller's user id, set by the upstream auth provider.
pub const USER_ID_HEADER: &str = "x-pfm-user-id";
/// Header carrying the shared secret for the manual trigger routes.
pub const RESET_SECRET_HEADER: &str = "x-pfm-reset-secret";

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    /// Billing timezone (IANA name).
    pub timezone: String,
    /// Whether `POST /v1/vouchers/reset` can be used at all.
    pub manual_reset_enabled: bool,
    pub scheduler: SchedulerStatus,
}

// ---------------------------------------------------------------------------
// /v1/cards/{card_id}/reconcile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileRequest {
    /// Decimal string ("600.00") or JSON number.
    pub declared_available: Decimal,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code: one of the [`ErrorKind`] codes, or `FORBIDDEN`.
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            message: message.into(),
        }
    }
}
