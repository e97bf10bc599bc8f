//! Applies module migrations once each, recording them in `schema_migrations`.

use anyhow::Context;
use libris_kernel::Migration;
use sqlx::PgPool;

const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    module     TEXT        NOT NULL,
    id         TEXT        NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (module, id)
)
"#;

/// Run every migration not yet recorded, each inside its own transaction.
/// Returns how many were applied.
pub async fn run(pool: &PgPool, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
    sqlx::raw_sql(LEDGER_DDL)
        .execute(pool)
        .await
        .context("failed to create migration ledger")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let done: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE module = $1 AND id = $2)",
        )
        .bind(module)
        .bind(migration.id)
        .fetch_one(pool)
        .await
        .context("failed to read migration ledger")?;

        if done {
            tracing::debug!(module = %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {module}/{} failed", migration.id))?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES ($1, $2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .context("failed to record migration")?;
        tx.commit().await.context("failed to commit migration")?;

        tracing::info!(module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
