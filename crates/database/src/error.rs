use std::path::PathBuf;
use thiserror::Error;

/// Every variant is fatal for the running stage: a store that cannot be
/// written leaves nothing consistent for the next stage to read.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to prepare the database location {path}: {source}")]
    StoreLocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database operation failed: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to write snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),

    #[error("Table '{0}' is empty; run the stage that produces it first.")]
    EmptyTable(&'static str),
}
