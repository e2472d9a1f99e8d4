//! # Observatory Ingest Crate
//!
//! This crate turns the customs workbooks (one worksheet per year) into the
//! normalized long-format trade table and checks it against the annual totals
//! printed in the sheets.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** Apart from opening the workbook through `calamine`, every
//!   function works on in-memory rows of cells, so the parser is tested without
//!   any files on disk.
//! - **Per-Sheet Failure:** A sheet that cannot be parsed yields a `ParseError`
//!   that is logged and collected; it never aborts the rest of the workbook.
//! - **Advisory QA:** The `QaReconciler` flags deviations between the summed months
//!   and the annual total but never drops data.
//!
//! ## Public API
//!
//! - `extract_national` / `extract_categories`: Read every year sheet of a workbook.
//! - `parse_year_sheet` / `parse_category_sheet`: Parse a single sheet's rows.
//! - `LongFormatBuilder`, `CategoryTableBuilder`: Union sheets into one table.
//! - `QaReconciler`, `QaReport`: The annual-total reconciliation.
//! - `IngestError`, `ParseError`: The specific error types of this crate.

// Declare the modules that constitute this crate.
pub mod categories;
pub mod error;
pub mod extract;
pub mod long_format;
pub mod reconciler;
pub mod sheet;
pub mod workbook;

// Re-export the key components to create a clean, public-facing API.
pub use categories::parse_category_sheet;
pub use error::{IngestError, ParseError};
pub use extract::{count_year_sheets, extract_categories, extract_national, Extraction};
pub use long_format::{CategoryTableBuilder, LongFormatBuilder, LongTable};
pub use reconciler::{QaEntry, QaReconciler, QaReport, QaStatus};
pub use sheet::{parse_year_sheet, ParsedSheet};
pub use workbook::Workbook;
