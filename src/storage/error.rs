//! Error types for storage operations

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection failed
    #[error("failed to connect to storage backend: {0}")]
    ConnectionFailed(String),

    /// Database query failed
    #[error("storage query failed: {0}")]
    QueryFailed(String),

    /// An insert hit a uniqueness constraint
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// I/O error (file access, etc.)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The backend is not healthy
    #[error("storage backend unhealthy: {0}")]
    UnhealthyBackend(String),
}

impl StorageError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StorageError::DuplicateKey(_))
    }
}

/// Error codes backends use for unique violations
/// (PostgreSQL SQLSTATE, SQLite extended result codes for UNIQUE and PRIMARY KEY).
#[cfg(feature = "storage-sqlite")]
const DUPLICATE_KEY_CODES: &[&str] = &["23505", "2067", "1555"];

static DUPLICATE_KEY_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(duplicate key value|unique constraint failed|already exists|\b23505\b)")
        .expect("duplicate key pattern is valid")
});

/// Last-resort duplicate detection on an error message.
///
/// Only used when a backend error carries no structured kind or code. This
/// depends on the wording of the database driver and may break when it changes.
pub fn looks_like_duplicate_key(message: &str) -> bool {
    DUPLICATE_KEY_MESSAGE.is_match(message)
}

#[cfg(feature = "storage-sqlite")]
fn is_unique_violation(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    if db_err.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_err.code()
        && DUPLICATE_KEY_CODES.iter().any(|known| code == *known)
    {
        return true;
    }

    looks_like_duplicate_key(db_err.message())
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return StorageError::DuplicateKey(err.to_string());
        }

        match err {
            sqlx::Error::Io(io_err) => StorageError::IoError(io_err),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::ConnectionFailed(err.to_string())
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}
