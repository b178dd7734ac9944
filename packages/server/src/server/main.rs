// Main entry point for the Miles API server

use anyhow::{Context, Result};
use miles_core::kernel::{scheduled_tasks::start_scheduler, ServerDeps};
use miles_core::server::{build_app, with_rate_limit, AppState};
use miles_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,miles_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Miles matching API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let state = AppState::new(ServerDeps::from_config(&config, pool.clone()), Some(pool));

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = match config.sweep_schedule.as_deref() {
        Some(schedule) => Some(start_scheduler(schedule, state.deps.clone()).await?),
        None => {
            tracing::info!("SWEEP_SCHEDULE not set; expiry sweep must be triggered externally");
            None
        }
    };

    let app = with_rate_limit(build_app(state, &config.allowed_origins))?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
