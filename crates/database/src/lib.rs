//! # Observatory Database Crate
//!
//! This crate acts as a high-level, application-specific interface to the
//! SQLite store. It is the system's "permanent archive" between pipeline stages.
//!
//! ## Architectural Principles
//!
//! - **Layer 3 Adapter:** This crate encapsulates all database-specific logic. It
//!   provides a clean, abstract API to the rest of the application, hiding the
//!   underlying SQL, the view definitions and the Parquet snapshot format.
//! - **Replace, Never Append:** Every table is rewritten wholesale inside one
//!   transaction, so reruns on unchanged input produce identical tables.
//! - **Reusable Queries:** Pivots, windows and period roll-ups live in SQL views
//!   created by the migrations; the repository only parametrizes them by year.
//!
//! ## Public API
//!
//! - `connect`: The async function to open the SQLite store and its connection pool.
//! - `run_migrations`: Applies the table and view migrations.
//! - `DbRepository`: Holds the pool and provides all data access methods.
//! - `snapshot`: Writers for the Parquet copies of each table.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;
pub mod snapshot;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_url, run_migrations};
pub use error::DbError;
pub use repository::{
    AnnualRow, CategoryKpiRow, CategoryTradeRow, DbRepository, KpiRow, PivotRow, QuarterRow,
    StoreTable, TradeRow, WindowedRow, YearRange,
};
