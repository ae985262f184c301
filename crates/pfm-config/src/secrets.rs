//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES under `secrets_env`; this module is
//! the single place that reads their values. Callers resolve once at startup
//! and pass [`ResolvedSecrets`] into constructors.
//!
//! | Mode   | Required         | Optional       |
//! |--------|------------------|----------------|
//! | DAEMON | database url     | reset trigger  |
//! | CLI    | nothing          | database url   |
//!
//! A daemon without a reset-trigger secret keeps the manual trigger route
//! closed (403); the scheduled tick is unaffected. CLI commands that touch the
//! database check for the url themselves, so `config-hash` works offline.
//!
//! Error messages name the env var, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ConfigMode;

pub const DEFAULT_RESET_TRIGGER_ENV: &str = "PFM_RESET_SECRET";
pub const DEFAULT_DATABASE_URL_ENV: &str = "PFM_DATABASE_URL";

/// Values are redacted in `Debug` output.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Shared secret for the manual voucher-reset trigger.
    pub reset_trigger_secret: Option<String>,
    pub database_url: Option<String>,
    /// Env var the url was read from, for error messages.
    pub database_url_var: String,
}

impl ResolvedSecrets {
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.database_url_var
            ),
        }
    }
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "reset_trigger_secret",
                &self.reset_trigger_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field("database_url_var", &self.database_url_var)
            .finish()
    }
}

/// Read a non-empty string value at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Unset or blank both count as absent.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn resolve_secrets_for_mode(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let reset_var = read_str_at(config_json, "/secrets_env/reset_trigger")
        .unwrap_or_else(|| DEFAULT_RESET_TRIGGER_ENV.to_string());
    let db_var = read_str_at(config_json, "/secrets_env/database_url")
        .unwrap_or_else(|| DEFAULT_DATABASE_URL_ENV.to_string());

    let secrets = ResolvedSecrets {
        reset_trigger_secret: match mode {
            ConfigMode::Daemon => resolve_env(&reset_var),
            ConfigMode::Cli => None,
        },
        database_url: resolve_env(&db_var),
        database_url_var: db_var,
    };

    if mode == ConfigMode::Daemon && secrets.database_url.is_none() {
        bail!(
            "SECRETS_MISSING mode=DAEMON: required env var '{}' (database url) is not set or empty",
            secrets.database_url_var
        );
    }

    Ok(secrets)
}
