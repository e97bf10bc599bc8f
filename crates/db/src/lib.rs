//! PostgreSQL access for LIBRIS: pool construction, the migration runner, the
//! shared store error type, and the core `database` module.

pub mod error;
pub mod migrate;

use std::future::Future;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use libris_kernel::settings::DatabaseSettings;
use libris_kernel::{InitCtx, Module};
use sqlx::postgres::{PgPool, PgPoolOptions};

pub use error::StoreError;

/// Open a bounded connection pool. Acquisition blocks up to the configured
/// timeout before failing.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect(&settings.url)
        .await
        .context("failed to connect to PostgreSQL")?;

    tracing::info!(
        target: "libris-db",
        max_connections = settings.max_connections,
        "connected to PostgreSQL"
    );
    Ok(pool)
}

/// Round-trip a trivial query; used by the health endpoint.
pub async fn ping(pool: &PgPool) -> Result<(), StoreError> {
    observe("ping", "-", sqlx::query("SELECT 1").execute(pool))
        .await
        .map(|_| ())
}

/// Await a query future, timing it into `database_operation_duration_seconds`
/// and translating the error. Failures other than unique violations are logged
/// here with their operation and table.
pub async fn observe<T, F>(
    operation: &'static str,
    table: &'static str,
    query: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    let started = Instant::now();
    let result = query.await;
    libris_telemetry::metrics::record_db_operation(
        operation,
        table,
        result.is_ok(),
        started.elapsed(),
    );

    result.map_err(|source| {
        let err = StoreError::from(source);
        if !err.is_unique_violation() {
            libris_telemetry::metrics::record_error("database", table);
            tracing::error!(operation, table, error = %err, "database operation failed");
        }
        err
    })
}

/// Core module owning the pool: closes it on shutdown.
pub struct DatabaseModule {
    pool: PgPool,
}

impl DatabaseModule {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        ping(&self.pool)
            .await
            .context("database did not answer ping")?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(target: "libris-db", "database pool closed");
        Ok(())
    }
}
