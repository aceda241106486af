//! State management with SQLite persistence.
//!
//! The StateManager records what the deployer has created:
//! - Stacks and their deployment status
//! - Resources per stack with input fingerprints and computed outputs

use crate::error::{Result, StackError};
use crate::types::{DeployedResource, ResourceKind, StackRecord, StackStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{info, instrument};

pub mod migrations;


/// State manager for persistent storage.
#[derive(Clone)]
pub struct StateManager {
    pool: SqlitePool,
}

impl StateManager {
    /// Create a new StateManager with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Create a new StateManager with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state manager at {:?}", db_path);

        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StackError::IoError { path: parent.to_path_buf(), source: e })?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            StackError::InvalidConfig {
                key: "data_dir".to_string(),
                reason: "database path is not valid UTF-8".to_string(),
            }
        })?)
        .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        options = options.create_if_missing(true).log_statements(tracing::log::LevelFilter::Debug);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        let manager = Self { pool };
        manager.run_migrations().await?;

        info!("State manager initialized successfully");
        Ok(manager)
    }

    #[instrument(skip(self))]
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    // ========================
    // Stack Operations
    // ========================

    /// Insert a stack or update its status, keeping the original creation time.
    #[instrument(skip(self), fields(stack = %name))]
    pub async fn upsert_stack(&self, name: &str, project: &str, status: StackStatus) -> Result<()> {
        let now = to_secs(SystemTime::now());

        sqlx::query(
            r#"
            INSERT INTO stacks (name, project, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                project = excluded.project,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(project)
        .bind(status.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get a stack by name.
    #[instrument(skip(self), fields(stack = %name))]
    pub async fn get_stack(&self, name: &str) -> Result<Option<StackRecord>> {
        let row = sqlx::query("SELECT * FROM stacks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        row.map(|row| self.row_to_stack(row)).transpose()
    }

    /// List all stacks.
    #[instrument(skip(self))]
    pub async fn list_stacks(&self) -> Result<Vec<StackRecord>> {
        let rows = sqlx::query("SELECT * FROM stacks ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_stack(row)).collect()
    }

    /// Delete a stack and every resource recorded for it.
    #[instrument(skip(self), fields(stack = %name))]
    pub async fn delete_stack(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StackError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM resources WHERE stack = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM stacks WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        tx.commit().await.map_err(|e| StackError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn row_to_stack(&self, row: SqliteRow) -> Result<StackRecord> {
        let status: String = row.get("status");
        let status: StackStatus = status.parse().map_err(StackError::DatabaseError)?;

        Ok(StackRecord {
            name: row.get("name"),
            project: row.get("project"),
            status,
            created_at: from_secs(row.get("created_at")),
            updated_at: from_secs(row.get("updated_at")),
        })
    }

    // ========================
    // Resource Operations
    // ========================

    /// Record a created resource, replacing any previous record of the same name.
    #[instrument(skip(self, resource), fields(stack = %resource.stack, resource = %resource.name))]
    pub async fn record_resource(&self, resource: &DeployedResource) -> Result<()> {
        let spec_json = serde_json::to_string(&resource.resource).map_err(|e| {
            StackError::DatabaseError(format!("Failed to serialize resource: {}", e))
        })?;
        let outputs_json = serde_json::to_string(&resource.outputs).map_err(|e| {
            StackError::DatabaseError(format!("Failed to serialize outputs: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO resources
                (stack, name, kind, spec, fingerprint, outputs, sequence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&resource.stack)
        .bind(&resource.name)
        .bind(resource.kind.to_string())
        .bind(spec_json)
        .bind(&resource.fingerprint)
        .bind(outputs_json)
        .bind(resource.sequence)
        .bind(to_secs(resource.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Resources recorded for a stack, in creation sequence.
    #[instrument(skip(self), fields(stack = %stack))]
    pub async fn list_resources(&self, stack: &str) -> Result<Vec<DeployedResource>> {
        let rows = sqlx::query("SELECT * FROM resources WHERE stack = ? ORDER BY sequence, name")
            .bind(stack)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(|row| self.row_to_resource(row)).collect()
    }

    /// Forget a resource.
    #[instrument(skip(self), fields(stack = %stack, resource = %name))]
    pub async fn delete_resource(&self, stack: &str, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM resources WHERE stack = ? AND name = ?")
            .bind(stack)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| StackError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    fn row_to_resource(&self, row: SqliteRow) -> Result<DeployedResource> {
        let kind: String = row.get("kind");
        let kind: ResourceKind = kind.parse().map_err(StackError::DatabaseError)?;

        let spec_json: String = row.get("spec");
        let resource = serde_json::from_str(&spec_json).map_err(|e| {
            StackError::DatabaseError(format!("Failed to deserialize resource: {}", e))
        })?;

        let outputs_json: String = row.get("outputs");
        let outputs = serde_json::from_str(&outputs_json).map_err(|e| {
            StackError::DatabaseError(format!("Failed to deserialize outputs: {}", e))
        })?;

        Ok(DeployedResource {
            stack: row.get("stack"),
            name: row.get("name"),
            kind,
            resource,
            fingerprint: row.get("fingerprint"),
            outputs,
            sequence: row.get("sequence"),
            created_at: from_secs(row.get("created_at")),
        })
    }
}

fn to_secs(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn from_secs(secs: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}
