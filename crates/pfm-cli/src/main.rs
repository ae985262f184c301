use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

mod commands;

use commands::Ctx;

#[derive(Parser)]
#[command(name = "pfm")]
#[command(about = "Card limit reconciliation and voucher reset CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order. Falls back to PFM_CONFIG.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Card limit commands
    Card {
        #[command(subcommand)]
        cmd: CardCmd,
    },

    /// Food-voucher reset commands
    Reset {
        #[command(subcommand)]
        cmd: ResetCmd,
    },

    /// Reclassify every card's type from its name
    Normalize,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations (idempotent).
    Migrate,
}

#[derive(Subcommand)]
enum CardCmd {
    /// Print the available limit derived from the ledger.
    Available {
        #[arg(long)]
        card: String,

        /// Acting user; must own the card.
        #[arg(long)]
        user: String,

        /// Evaluate as of this RFC 3339 instant instead of now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Book an adjustment so the available limit matches `--declared`.
    Reconcile {
        #[arg(long)]
        card: String,

        #[arg(long)]
        user: String,

        /// Declared available limit, e.g. 1250.40
        #[arg(long, allow_hyphen_values = true)]
        declared: String,

        #[arg(long)]
        at: Option<String>,

        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ResetCmd {
    /// Run one reset pass now (or as of `--at`).
    Run {
        #[arg(long)]
        at: Option<String>,

        /// Exit non-zero when the pass is skipped by its guard.
        #[arg(long, default_value_t = false)]
        require: bool,
    },

    /// Show the reset marker and the users reset for a month.
    Status {
        /// YYYY-MM; defaults to the current month in the configured timezone.
        #[arg(long)]
        month: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if absent.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let ctx = Ctx::connect(&cli.config_paths).await?;
            match cmd {
                DbCmd::Status => {
                    let s = pfm_db::status(&ctx.pool).await?;
                    println!("db_ok={} has_ledger_schema={}", s.ok, s.has_ledger_schema);
                }
                DbCmd::Migrate => {
                    pfm_db::migrate(&ctx.pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = pfm_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Card { cmd } => match cmd {
            CardCmd::Available { card, user, at } => {
                let card = parse_uuid(&card, "card")?;
                let user = parse_uuid(&user, "user")?;
                let ctx = Ctx::connect(&cli.config_paths).await?;
                commands::card::available(&ctx, card, user, at.as_deref()).await?;
            }
            CardCmd::Reconcile {
                card,
                user,
                declared,
                at,
                json,
            } => {
                let card = parse_uuid(&card, "card")?;
                let user = parse_uuid(&user, "user")?;
                let declared: Decimal = declared
                    .trim()
                    .parse()
                    .with_context(|| format!("INVALID_INPUT declared amount '{declared}'"))?;
                let ctx = Ctx::connect(&cli.config_paths).await?;
                commands::card::reconcile(&ctx, card, user, declared, at.as_deref(), json).await?;
            }
        },

        Commands::Reset { cmd } => {
            let ctx = Ctx::connect(&cli.config_paths).await?;
            match cmd {
                ResetCmd::Run { at, require } => {
                    commands::reset::run(&ctx, at.as_deref(), require).await?;
                }
                ResetCmd::Status { month } => {
                    commands::reset::status(&ctx, month.as_deref()).await?;
                }
            }
        }

        Commands::Normalize => {
            let ctx = Ctx::connect(&cli.config_paths).await?;
            let engine = ctx.engine().await?;
            let report = engine
                .normalizer
                .normalize_all()
                .await
                .map_err(commands::engine_err)?;
            println!(
                "scanned={} reclassified={} failures={}",
                report.scanned,
                report.reclassified.len(),
                report.failures.len()
            );
            for f in &report.failures {
                println!("failed card_id={} error={}", f.card_id, f.error);
            }
            tracing::debug!(config_hash = %ctx.loaded.config_hash, "normalize done");
        }
    }

    Ok(())
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("INVALID_INPUT invalid {what} uuid '{raw}'"))
}
