use std::path::PathBuf;
use thiserror::Error;

/// A worksheet that could not be read. Fatal for that sheet only: the caller
/// logs it and moves on to the next year.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Sheet '{sheet}' (year {year}): header row with month names not found")]
    HeaderNotFound { sheet: String, year: i32 },

    #[error("Sheet '{sheet}' (year {year}): 'Total general' row not found")]
    TotalRowNotFound { sheet: String, year: i32 },

    #[error("Sheet '{sheet}' (year {year}): header is missing columns {missing:?}")]
    IncompleteHeader {
        sheet: String,
        year: i32,
        missing: Vec<String>,
    },

    #[error("Sheet '{sheet}' (year {year}): cell ({row}, {column}) is not a number: {value}")]
    InvalidCell {
        sheet: String,
        year: i32,
        row: usize,
        column: usize,
        value: String,
    },

    #[error("Sheet '{sheet}' could not be loaded: {reason}")]
    Unreadable { sheet: String, reason: String },
}

impl ParseError {
    /// The worksheet the error refers to.
    pub fn sheet(&self) -> &str {
        match self {
            ParseError::HeaderNotFound { sheet, .. }
            | ParseError::TotalRowNotFound { sheet, .. }
            | ParseError::IncompleteHeader { sheet, .. }
            | ParseError::InvalidCell { sheet, .. }
            | ParseError::Unreadable { sheet, .. } => sheet,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Input file not found: {0}")]
    MissingInput(PathBuf),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
