//! pfm-daemon entry point.
//!
//! Thin on purpose: tracing, config, database, engine wiring, background
//! tasks, then the HTTP server. Route handlers live in `routes.rs`; shared
//! state and the timer tasks live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use pfm_config::{
    report_unused_keys, secrets::resolve_secrets_for_mode, ConfigMode, MarkerBackend,
    ServiceSettings, UnusedKeyPolicy,
};
use pfm_daemon::{routes, state};
use pfm_db::{PgLedgerStore, PgResetMarker, PgVoucherResetter};
use pfm_reconcile::{BillingCalendar, Engine, EngineSettings, InMemoryResetMarker, ResetMarkerStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = pfm_config::load_from_env().context("load config")?;
    let unused = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(pointer = %ptr, "config key is not read by the daemon");
    }
    let settings = ServiceSettings::from_config_json(&loaded.config_json)?;
    let secrets = resolve_secrets_for_mode(&loaded.config_json, ConfigMode::Daemon)?;
    info!(config_hash = %loaded.config_hash, ?secrets, "config loaded");

    let pool = pfm_db::connect(secrets.require_database_url()?).await?;
    pfm_db::migrate(&pool).await?;

    let calendar = BillingCalendar::from_name(&settings.timezone)?;
    let marker: Arc<dyn ResetMarkerStore> = match settings.marker {
        MarkerBackend::Postgres => Arc::new(PgResetMarker::new(pool.clone())),
        MarkerBackend::Memory => {
            warn!("in-memory reset marker: once-per-month guard resets on restart");
            Arc::new(InMemoryResetMarker::new())
        }
    };
    let engine = Engine::build(
        Arc::new(PgLedgerStore::new(pool.clone())),
        Arc::new(PgVoucherResetter::new(pool)),
        marker,
        EngineSettings {
            calendar,
            epsilon: settings.epsilon,
            adjustment_category: settings.adjustment_category.clone(),
            per_user_timeout: settings.per_user_timeout,
            food_voucher_marker: settings.food_voucher_marker.clone(),
        },
    )
    .await?;

    if settings.normalize_on_boot {
        let report = engine.normalizer.normalize_all().await?;
        info!(
            scanned = report.scanned,
            reclassified = report.reclassified.len(),
            failures = report.failures.len(),
            "card types normalized at boot"
        );
    }

    let shared = Arc::new(state::AppState::new(
        engine,
        state::DaemonOptions {
            reset_secret: secrets.reset_trigger_secret.clone(),
            config_hash: loaded.config_hash.clone(),
        },
    ));
    if shared.reset_secret.is_none() {
        info!("no reset secret configured; manual trigger routes are closed");
    }

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_reset_tick(Arc::clone(&shared), settings.reset_tick_interval);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or(settings.bind_addr);
    info!("pfm-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `PFM_DAEMON_ADDR` wins over `daemon.bind_addr` from config.
fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("PFM_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
