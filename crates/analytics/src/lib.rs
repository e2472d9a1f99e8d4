//! # Observatory Analytics Engine
//!
//! This crate derives everything the reports and the dashboard show from the
//! stored trade series: monthly KPIs, exploratory statistics and the ranked
//! category findings.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of the
//!   store or the file system and depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** `KpiCalculator`, `EdaAnalyzer` and `InsightsEngine`
//!   are stateless calculators configured once and applied to slices of records.
//! - **Undefined Is Not an Error:** Missing history and zero denominators yield
//!   `None` metrics; only an empty input is reported as an `AnalyticsError`.
//!
//! ## Public API
//!
//! - `KpiCalculator`: MoM, YoY, moving averages, base index and coverage.
//! - `EdaAnalyzer` / `EdaReport`: descriptive statistics, seasonality, outliers and trend.
//! - `InsightsEngine` / `ExecutiveSummary`: narrative findings per category.
//! - `QuickStats`: latest year, active categories, best month and YoY volatility.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod eda;
pub mod error;
pub mod insights;
pub mod kpi;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use eda::{observations_from_kpi, observations_from_pivot, EdaAnalyzer};
pub use error::AnalyticsError;
pub use insights::{format_currency, ActionTier, ExecutiveSummary, Insight, InsightsEngine, QuickStats};
pub use kpi::{pivot_categories, pivot_national, KpiCalculator, PivotPoint};
pub use report::{EdaReport, Observation, Outlier, SeasonalGrid, SeasonalMean, TrendPoint};
