use crate::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Opens (creating if needed) the SQLite store at `path` and returns a pool.
///
/// The parent directory is created so a fresh checkout can run the ETL without
/// preparing anything. WAL mode lets the dashboard read while a stage writes.
pub async fn connect(path: &Path) -> Result<SqlitePool, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DbError::StoreLocation {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::debug!(path = %path.display(), "Connected to the store.");
    Ok(pool)
}

/// Connects to a database URL such as `sqlite::memory:`; used by tests and tools.
pub async fn connect_url(url: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // A single connection keeps an in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Applies the schema and view migrations, bringing the store up to date.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
