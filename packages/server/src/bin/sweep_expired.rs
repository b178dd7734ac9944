//! CLI for running the expiry sweep once
//!
//! Meant for external schedulers (cron, Kubernetes CronJob, etc.). Prints the
//! sweep report as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use miles_core::config::Config;
use miles_core::domains::matching::activities::{advance, sweep_expired};
use miles_core::kernel::ServerDeps;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sweep_expired")]
#[command(about = "Expire overdue offers and advance their requests")]
struct Cli {
    /// Only advance this request (skips expiry), e.g. after a manual radius change
    #[arg(long)]
    request_id: Option<String>,

    /// Radius override for --request-id, in kilometres
    #[arg(long, requires = "request_id")]
    radius_km: Option<f64>,

    /// Skip migrations (database is managed elsewhere)
    #[arg(long)]
    no_migrate: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output<A: Serialize, S: Serialize> {
    Advance(A),
    Sweep(S),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,miles_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    if !cli.no_migrate {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let deps = ServerDeps::from_config(&config, pool);

    let output = match cli.request_id {
        Some(raw) => {
            let request_id = raw
                .parse()
                .with_context(|| format!("Invalid request id: {}", raw))?;
            let radius_km = cli.radius_km.unwrap_or(deps.settings.default_radius_km);
            Output::Advance(advance(request_id, radius_km, &deps).await?)
        }
        None => Output::Sweep(sweep_expired(&deps).await?),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
