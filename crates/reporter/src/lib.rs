//! # Observatory Reporter Crate
//!
//! This crate turns an `EdaReport` into the files a reader opens: interactive
//! Plotly charts and a Markdown summary.
//!
//! ## Architectural Principles
//!
//! - **Presentation Only:** Every number shown is already in the `EdaReport`;
//!   this crate only lays it out.
//! - **Self-Contained Artifacts:** Each chart is a standalone HTML page that loads
//!   Plotly.js and embeds its figure as JSON, so the reports directory can be
//!   copied anywhere.
//!
//! ## Public API
//!
//! - `write_reports`: Writes every chart and the summary into a directory.
//! - `Chart` / `Figure`: The individual chart builders.
//! - `render_summary`: The Markdown narrative.
//! - `ReportError`: The specific error types that can be returned from this crate.

use analytics::EdaReport;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

// Declare the modules that constitute this crate.
pub mod charts;
pub mod error;
pub mod summary;

// Re-export the key components to create a clean, public-facing API.
pub use charts::{Chart, Figure};
pub use error::ReportError;
pub use summary::render_summary;

pub const SUMMARY_FILE: &str = "eda_summary.md";

/// Writes the EDA artifacts into `dir`, creating it if needed, and returns
/// the paths written. Existing files are overwritten.
pub fn write_reports(dir: &Path, report: &EdaReport) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(Chart::ALL.len() + 1);

    let summary_path = dir.join(SUMMARY_FILE);
    write_file(&summary_path, &render_summary(report, Local::now())?)?;
    written.push(summary_path);

    for chart in Chart::ALL {
        let path = dir.join(chart.file_name());
        let html = chart.figure(report).to_html(chart.title())?;
        write_file(&path, &html)?;
        tracing::debug!(path = %path.display(), "Chart written.");
        written.push(path);
    }

    tracing::info!(dir = %dir.display(), files = written.len(), "EDA reports written.");
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
