use anyhow::Result;
use sqlx::{Executor, PgPool};
use tracing::info;

/// Migrations embedded at compile time, applied in declaration order.
/// Each file must be idempotent (IF NOT EXISTS / duplicate_object guards),
/// so re-running the full set on startup is safe.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_tables",
        include_str!("sql/0001_create_tables.sql"),
    ),
    ("0002_add_indexes", include_str!("sql/0002_add_indexes.sql")),
];

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        pool.execute(*sql)
            .await
            .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        info!("Applied migration: {}", name);
    }

    Ok(())
}
