//! SQLite pool setup for the local store

use laboursync_core::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// Where the store lives and how the pool talks to it
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// WAL lets readers (status queries) proceed while the engine writes
    pub enable_wal: bool,
    pub create_if_missing: bool,
    /// How long a writer waits for a competing write transaction
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("laboursync.db"),
            max_connections: 4,
            enable_wal: true,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_wal(mut self, enable: bool) -> Self {
        self.enable_wal = enable;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(self.create_if_missing)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true);

        if self.enable_wal {
            options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        } else {
            options
                .journal_mode(SqliteJournalMode::Delete)
                .synchronous(SqliteSynchronous::Full)
        }
    }
}

/// Opens a pool on the configured file without touching the schema
pub async fn connect(config: DatabaseConfig) -> Result<DbPool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            AppError::database(format!("Failed to open {}", config.path.display()), e)
        })?;

    log::debug!(
        "Opened outbox database at {} ({} connections, wal: {})",
        config.path.display(),
        config.max_connections,
        config.enable_wal
    );

    Ok(pool)
}

/// Creates a private in-memory database
///
/// The pool is pinned to a single connection that never expires, since every
/// SQLite in-memory connection is its own database.
pub async fn connect_in_memory() -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AppError::database("Failed to create in-memory database", e))?
        .journal_mode(SqliteJournalMode::Memory)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database("Failed to connect to in-memory database", e))
}

/// Waits for in-flight statements and closes every connection
pub async fn close(pool: DbPool) {
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn journal_mode(pool: &DbPool) -> String {
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
            .fetch_one(pool)
            .await
            .unwrap();
        mode.to_lowercase()
    }

    #[tokio::test]
    async fn test_connect_creates_database_in_wal_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outbox.db");

        let pool = connect(DatabaseConfig::new(&path)).await.unwrap();

        assert!(path.exists());
        assert_eq!(journal_mode(&pool).await, "wal");
        close(pool).await;
    }

    #[tokio::test]
    async fn test_connect_without_wal() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(temp_dir.path().join("outbox.db")).with_wal(false);

        let pool = connect(config).await.unwrap();

        assert_eq!(journal_mode(&pool).await, "delete");
        close(pool).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error_without_create() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            DatabaseConfig::new(temp_dir.path().join("absent.db")).with_create_if_missing(false);

        assert!(matches!(
            connect(config).await,
            Err(AppError::DatabaseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_with_spaces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("my labour data.db");

        let pool = connect(DatabaseConfig::new(&path)).await.unwrap();
        sqlx::query("SELECT 1;").execute(&pool).await.unwrap();

        assert!(path.exists());
        close(pool).await;
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let pool = connect_in_memory().await.unwrap();

        sqlx::query("CREATE TABLE t (x INTEGER)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO t VALUES (1)").execute(&pool).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(count, 1);
        close(pool).await;
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("test.db")
            .with_max_connections(20)
            .with_wal(false)
            .with_create_if_missing(false)
            .with_busy_timeout(Duration::from_millis(250));

        assert_eq!(config.path, PathBuf::from("test.db"));
        assert_eq!(config.max_connections, 20);
        assert!(!config.enable_wal);
        assert!(!config.create_if_missing);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }
}
