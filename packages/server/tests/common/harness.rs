//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by every test in the binary. Migrations
//! run once on first use; each test gets its own pool and keeps to its own
//! patch of the map (see `fixtures::unique_origin`) so tests never see each
//! other's professionals.

use anyhow::{Context, Result};
use miles_core::kernel::test_dependencies::{MockEmailService, MockGeocoder, MockPushNotificationService};
use miles_core::kernel::ServerDeps;
use miles_core::domains::matching::{MatchingSettings, PostgresMatchLedger};
use miles_core::domains::professionals::PostgresProfessionalDirectory;
use miles_core::domains::requests::PostgresRequestStore;
use sqlx::PgPool;
use std::sync::Arc;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --ignored --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Postgres-backed dependencies with mock providers.
pub struct TestHarness {
    pub db_pool: PgPool,
    pub email: Arc<MockEmailService>,
    pub push: Arc<MockPushNotificationService>,
    pub deps: ServerDeps,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        let email = Arc::new(MockEmailService::new());
        let push = Arc::new(MockPushNotificationService::new());

        let deps = ServerDeps::new(
            Arc::new(PostgresRequestStore::new(db_pool.clone())),
            Arc::new(PostgresMatchLedger::new(db_pool.clone())),
            Arc::new(PostgresProfessionalDirectory::new(db_pool.clone())),
            Arc::new(MockGeocoder::new()),
            email.clone(),
            push.clone(),
            MatchingSettings::builder()
                .public_base_url("http://localhost:8080")
                .build(),
        );

        Ok(Self {
            db_pool,
            email,
            push,
            deps,
        })
    }
}
