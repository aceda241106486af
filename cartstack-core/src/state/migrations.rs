//! Database migrations.

use crate::error::{Result, StackError};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    // Create schema_version table if not exists
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Stacks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stacks (
            name TEXT PRIMARY KEY,
            project TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    // Resources owned by a stack
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            stack TEXT NOT NULL REFERENCES stacks(name) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            spec TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            outputs TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (stack, name)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_stack_seq ON resources(stack, sequence)")
        .execute(pool)
        .await
        .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(1i64)
        .execute(pool)
        .await
        .map_err(|e| StackError::MigrationFailed { reason: e.to_string() })?;

    info!("Migration to version 1 complete");
    Ok(())
}
