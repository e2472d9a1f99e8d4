use crate::categories::parse_category_sheet;
use crate::error::{IngestError, ParseError};
use crate::sheet::{parse_year_sheet, ParsedSheet};
use crate::workbook::Workbook;
use core_types::{CategoryTradeRecord, Flow};
use std::path::Path;

/// What came out of one workbook: the sheets that parsed and the ones that were skipped.
#[derive(Debug, Default)]
pub struct Extraction<T> {
    pub parsed: Vec<T>,
    pub skipped: Vec<ParseError>,
}

fn for_each_sheet<T>(
    path: &Path,
    flow: Flow,
    mut on_sheet: impl FnMut(&str),
    mut parse: impl FnMut(&str, i32, &[Vec<calamine::Data>]) -> Result<T, ParseError>,
) -> Result<Extraction<T>, IngestError> {
    let mut workbook = Workbook::open(path)?;
    let sheets = workbook.year_sheets();
    tracing::info!(path = %workbook.path().display(), %flow, sheets = sheets.len(), "Reading workbook.");

    let mut extraction = Extraction {
        parsed: Vec::with_capacity(sheets.len()),
        skipped: Vec::new(),
    };
    for (name, year) in sheets {
        on_sheet(&name);
        let result = workbook.rows(&name).and_then(|rows| parse(&name, year, &rows));
        match result {
            Ok(parsed) => extraction.parsed.push(parsed),
            Err(e) => {
                tracing::warn!(%flow, error = %e, "Skipping sheet.");
                extraction.skipped.push(e);
            }
        }
    }
    Ok(extraction)
}

/// Parses every year sheet of a national-total workbook.
///
/// `on_sheet` is called before each sheet so callers can drive a progress bar.
/// A sheet that fails to parse is logged and recorded in `skipped`; the rest of
/// the workbook is still read.
pub fn extract_national(
    path: &Path,
    flow: Flow,
    on_sheet: impl FnMut(&str),
) -> Result<Extraction<ParsedSheet>, IngestError> {
    for_each_sheet(path, flow, on_sheet, |name, year, rows| {
        parse_year_sheet(name, year, flow, rows)
    })
}

/// Parses every year sheet of a per-category workbook.
pub fn extract_categories(
    path: &Path,
    flow: Flow,
    on_sheet: impl FnMut(&str),
) -> Result<Extraction<Vec<CategoryTradeRecord>>, IngestError> {
    for_each_sheet(path, flow, on_sheet, |name, year, rows| {
        parse_category_sheet(name, year, flow, rows)
    })
}

/// Number of year sheets in a workbook, for sizing progress bars.
pub fn count_year_sheets(path: &Path) -> Result<usize, IngestError> {
    Ok(Workbook::open(path)?.year_sheets().len())
}
