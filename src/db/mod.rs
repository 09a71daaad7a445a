//! SQLite-backed object, mastery and usage store.

pub mod operations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::db::schema::{split_sql_statements, SCHEMA_SQL, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Default database location under the platform's local data directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("com.danci.calibration")
        .join("calibration.db")
}

#[derive(Clone)]
pub struct CalibrationStore {
    pool: SqlitePool,
}

impl CalibrationStore {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreError::Config(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "calibration store opened");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn schema_version(&self) -> Result<Option<String>, StoreError> {
        let version = sqlx::query_scalar(
            r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let current: Option<String> = sqlx::query_scalar(
            r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#,
        )
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None);

        if current.as_deref() == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for stmt in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        sqlx::query(
            r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#,
        )
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(version = SCHEMA_VERSION, "calibration schema migrated");
        Ok(())
    }
}
