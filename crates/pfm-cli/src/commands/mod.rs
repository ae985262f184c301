//! Command handler modules for pfm-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod card;
pub mod reset;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use pfm_config::{
    report_unused_keys, secrets::resolve_secrets_for_mode, ConfigMode, LoadedConfig,
    ServiceSettings, UnusedKeyPolicy,
};
use pfm_db::{PgLedgerStore, PgResetMarker, PgVoucherResetter};
use pfm_reconcile::{BillingCalendar, Engine, EngineSettings, ReconcileError};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// `--config` paths win; otherwise `PFM_CONFIG`; otherwise all defaults.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let loaded = if paths.is_empty() {
        pfm_config::load_from_env()?
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        pfm_config::load_layered_yaml(&refs)?
    };

    let unused = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        tracing::debug!(pointer = %ptr, "config key is not read by the cli");
    }
    Ok(loaded)
}

/// Everything a DB-backed command needs.
pub struct Ctx {
    pub loaded: LoadedConfig,
    pub settings: ServiceSettings,
    pub pool: PgPool,
}

impl Ctx {
    pub async fn connect(paths: &[String]) -> Result<Self> {
        let loaded = load_config(paths)?;
        let settings = ServiceSettings::from_config_json(&loaded.config_json)?;
        let secrets = resolve_secrets_for_mode(&loaded.config_json, ConfigMode::Cli)?;
        let pool = pfm_db::connect(secrets.require_database_url()?).await?;
        Ok(Self {
            loaded,
            settings,
            pool,
        })
    }

    pub fn calendar(&self) -> Result<BillingCalendar> {
        BillingCalendar::from_name(&self.settings.timezone).map_err(engine_err)
    }

    /// Each invocation is a fresh process, so the reset marker is always the
    /// persisted one whatever `reset.marker` says.
    pub async fn engine(&self) -> Result<Engine> {
        Engine::build(
            Arc::new(PgLedgerStore::new(self.pool.clone())),
            Arc::new(PgVoucherResetter::new(self.pool.clone())),
            Arc::new(PgResetMarker::new(self.pool.clone())),
            EngineSettings {
                calendar: self.calendar()?,
                epsilon: self.settings.epsilon,
                adjustment_category: self.settings.adjustment_category.clone(),
                per_user_timeout: self.settings.per_user_timeout,
                food_voucher_marker: self.settings.food_voucher_marker.clone(),
            },
        )
        .await
        .map_err(engine_err)
    }
}

/// Render an engine error with its machine-readable kind first.
pub fn engine_err(e: ReconcileError) -> anyhow::Error {
    anyhow!("{} {}", e.kind().as_str(), e)
}

/// Parse an optional `--at` timestamp, defaulting to now.
pub fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("invalid --at '{raw}'; expected RFC 3339"))?
            .with_timezone(&Utc)),
    }
}

pub fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(v).context("serialize output failed")?
    );
    Ok(())
}
