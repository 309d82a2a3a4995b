use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod curriculum_repo;
mod mapping;
mod migrate;
mod patient_repo;
mod session_repo;
mod trial_repo;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Patient registry, curriculum, trials and sessions in one `SQLite` file.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool for `database_url`, creating the file if it is missing.
    ///
    /// Every connection runs with foreign keys enforced, WAL journaling and a
    /// busy timeout, so concurrent readers and the occasional writer do not
    /// fail on a locked database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the pool cannot
    /// be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connecting or migrating fails.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Apply pending schema versions. Safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Every repository role served by one migrated `SQLite` pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        SqliteRepository::open(database_url)
            .await
            .map(Self::from_repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_parent_directory_is_an_init_error() {
        let err = SqliteRepository::connect("sqlite:///no-such-dir/speech/progress.sqlite3")
            .await
            .err()
            .expect("directory does not exist");
        assert!(matches!(err, SqliteInitError::Sqlx(_)));
    }
}
