//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked by the collectors' writes
//! - **Connection pooling**: One pool shared by every collector task
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Concurrency
//!
//! SQLite serializes writers. Concurrent inserts wait on the busy timeout
//! instead of failing, and the `UNIQUE (name, address)` constraint on
//! `servers` turns a lost registration race into a unique violation
//! (extended code 2067) that is reported as `StorageError::DuplicateKey`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::MetricSample;
use crate::Target;

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Configure SQLite (WAL mode, busy timeout)
    /// 3. Run migrations to create tables
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use guardia_collector::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./metrics.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created");

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn lookup_target(&self, name: &str, address: &str) -> StorageResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM servers WHERE name = ? AND address = ?",
        )
        .bind(name)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    #[instrument(skip(self, target), fields(server = %target))]
    async fn insert_target(&self, target: &Target) -> StorageResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO servers (name, address, description, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&target.name)
        .bind(&target.address)
        .bind(&target.description)
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        debug!("inserted server with id {id}");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn target_exists(&self, id: i64) -> StorageResult<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM servers WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    #[instrument(
        skip(self, sample),
        fields(object_id = sample.object_id, metric = %sample.metric_name)
    )]
    async fn insert_metric(&self, sample: &MetricSample) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO metrics (object_type, object_id, metric_name, value, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.object_type.as_str())
        .bind(sample.object_id)
        .bind(sample.metric_name.as_str())
        .bind(sample.value)
        .bind(Self::timestamp_to_millis(&sample.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let servers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM servers")
            .fetch_one(&self.pool)
            .await?;

        let samples: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metrics")
            .fetch_one(&self.pool)
            .await?;

        let newest: Option<i64> = sqlx::query_scalar("SELECT MAX(timestamp) FROM metrics")
            .fetch_one(&self.pool)
            .await?;

        let last_sample = newest
            .map(|millis| Self::millis_to_timestamp(millis).to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        Ok(format!(
            "SQLite: {} servers, {} samples, last sample: {}",
            servers, samples, last_sample
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
