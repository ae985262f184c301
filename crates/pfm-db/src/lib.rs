use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};

mod reset;
mod store;

pub use reset::{list_user_resets, PgResetMarker, PgVoucherResetter, UserResetRow};
pub use store::{insert_card, PgLedgerStore};

pub const ENV_DB_URL: &str = "PFM_DATABASE_URL";

/// Connect to Postgres using PFM_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Connect with an explicit url (resolved through `pfm_config::secrets`).
pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (has_schema,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='ledger_entries'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_ledger_schema: has_schema,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DbStatus {
    pub ok: bool,
    pub has_ledger_schema: bool,
}
