//! Typed view over the merged config JSON.
//!
//! Every key is optional; absent keys fall back to [`ServiceSettings::default`].
//! Present keys with the wrong type or an unparseable value are rejected
//! with `CONFIG_INVALID` rather than silently defaulted.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerBackend {
    /// Process-local; the once-per-month guard does not survive restarts.
    Memory,
    /// `voucher_reset_marks` table; shared by every process on the database.
    Postgres,
}

impl MarkerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerBackend::Memory => "memory",
            MarkerBackend::Postgres => "postgres",
        }
    }
}

impl FromStr for MarkerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(MarkerBackend::Memory),
            "postgres" => Ok(MarkerBackend::Postgres),
            other => bail!("CONFIG_INVALID /reset/marker: unknown backend '{other}' (memory | postgres)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSettings {
    /// IANA timezone name; validated when the billing calendar is built.
    pub timezone: String,
    pub epsilon: Decimal,
    pub adjustment_category: String,
    pub reset_tick_interval: Duration,
    pub per_user_timeout: Duration,
    pub marker: MarkerBackend,
    pub food_voucher_marker: String,
    pub normalize_on_boot: bool,
    pub bind_addr: SocketAddr,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            epsilon: Decimal::new(1, 2),
            adjustment_category: "Limit adjustment".to_string(),
            reset_tick_interval: Duration::from_secs(3600),
            per_user_timeout: Duration::from_secs(30),
            marker: MarkerBackend::Postgres,
            food_voucher_marker: "voucher".to_string(),
            normalize_on_boot: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8899)),
        }
    }
}

impl ServiceSettings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let d = Self::default();

        let epsilon = match read_scalar(config, "/reconcile/epsilon")? {
            Some(raw) => {
                let eps = Decimal::from_str(&raw)
                    .map_err(|e| anyhow!("CONFIG_INVALID /reconcile/epsilon: {e}"))?;
                if eps.is_sign_negative() {
                    bail!("CONFIG_INVALID /reconcile/epsilon: must not be negative");
                }
                eps
            }
            None => d.epsilon,
        };

        let tick = read_u64(config, "/reset/tick_interval_secs")?;
        if tick == Some(0) {
            bail!("CONFIG_INVALID /reset/tick_interval_secs: must be > 0");
        }
        let per_user = read_u64(config, "/reset/per_user_timeout_secs")?;
        if per_user == Some(0) {
            bail!("CONFIG_INVALID /reset/per_user_timeout_secs: must be > 0");
        }

        let marker = match read_str(config, "/reset/marker")? {
            Some(s) => s.parse()?,
            None => d.marker,
        };

        let bind_addr = match read_str(config, "/daemon/bind_addr")? {
            Some(s) => s
                .parse::<SocketAddr>()
                .map_err(|e| anyhow!("CONFIG_INVALID /daemon/bind_addr '{s}': {e}"))?,
            None => d.bind_addr,
        };

        let adjustment_category = read_str(config, "/reconcile/adjustment_category")?
            .unwrap_or(d.adjustment_category);
        if adjustment_category.trim().is_empty() {
            bail!("CONFIG_INVALID /reconcile/adjustment_category: must not be blank");
        }

        Ok(Self {
            timezone: read_str(config, "/calendar/timezone")?.unwrap_or(d.timezone),
            epsilon,
            adjustment_category,
            reset_tick_interval: tick.map(Duration::from_secs).unwrap_or(d.reset_tick_interval),
            per_user_timeout: per_user.map(Duration::from_secs).unwrap_or(d.per_user_timeout),
            marker,
            food_voucher_marker: read_str(config, "/normalizer/food_voucher_marker")?
                .unwrap_or(d.food_voucher_marker),
            normalize_on_boot: read_bool(config, "/normalizer/run_on_boot")?
                .unwrap_or(d.normalize_on_boot),
            bind_addr,
        })
    }
}

fn read_str(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected string, got {other}"),
    }
}

fn read_u64(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| anyhow!("CONFIG_INVALID {pointer}: expected unsigned integer, got {v}")),
    }
}

fn read_bool(config: &Value, pointer: &str) -> Result<Option<bool>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected bool, got {other}"),
    }
}

/// Strings or numbers; YAML `0.01` and `"0.01"` both land here.
fn read_scalar(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected number, got {other}"),
    }
}
