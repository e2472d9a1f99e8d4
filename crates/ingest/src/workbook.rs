use crate::error::{IngestError, ParseError};
use crate::sheet::sheet_year;
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// A source workbook holding one worksheet per calendar year.
pub struct Workbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    /// Opens an .xlsx/.xls/.ods workbook; the format is detected from the extension.
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Err(IngestError::MissingInput(path.to_path_buf()));
        }
        let sheets = open_workbook_auto(path).map_err(|source| IngestError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names and years of the sheets named like a year, in workbook order.
    /// Other sheets (notes, indexes) are skipped.
    pub fn year_sheets(&self) -> Vec<(String, i32)> {
        self.sheets
            .sheet_names()
            .into_iter()
            .filter_map(|name| match sheet_year(&name) {
                Some(year) => Some((name, year)),
                None => {
                    tracing::debug!(sheet = %name, "Skipping non-year sheet.");
                    None
                }
            })
            .collect()
    }

    /// Materializes a sheet as rows of cells, indexed from A1.
    ///
    /// calamine trims leading empty rows and columns from a range; they are
    /// restored so column positions match what a user sees in the sheet.
    pub fn rows(&mut self, sheet: &str) -> Result<Vec<Vec<Data>>, ParseError> {
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| ParseError::Unreadable {
                sheet: sheet.to_string(),
                reason: e.to_string(),
            })?;
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        let mut rows: Vec<Vec<Data>> = vec![Vec::new(); start_row as usize];
        rows.extend(range.rows().map(|row| {
            let mut cells = vec![Data::Empty; start_col as usize];
            cells.extend_from_slice(row);
            cells
        }));
        Ok(rows)
    }
}
