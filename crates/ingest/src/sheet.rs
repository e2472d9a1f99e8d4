//! Locates the header and "Total general" rows of a yearly worksheet and
//! extracts the twelve monthly values plus the annual total.

use crate::error::ParseError;
use calamine::Data;
use core_types::{normalize_label, Flow, Month};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Label of the row holding the national aggregate of each sheet.
pub const TOTAL_ROW_LABEL: &str = "total general";
/// Header label of the annual total column.
pub const TOTAL_COLUMN_LABEL: &str = "total";

/// The column layout discovered in a sheet's header row.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLayout {
    pub row: usize,
    /// Month columns in calendar order.
    pub month_columns: Vec<(Month, usize)>,
    pub total_column: Option<usize>,
}

/// The output of parsing one yearly sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub sheet: String,
    pub year: i32,
    pub flow: Flow,
    /// Always twelve entries in calendar order. `None` marks a blank cell
    /// (a month not yet reported in the current year).
    pub months: Vec<(Month, Option<Decimal>)>,
    pub annual_total: Decimal,
}

impl ParsedSheet {
    pub fn reported_months(&self) -> impl Iterator<Item = (Month, Decimal)> + '_ {
        self.months.iter().filter_map(|(m, v)| v.map(|v| (*m, v)))
    }

    pub fn monthly_sum(&self) -> Decimal {
        self.reported_months().map(|(_, v)| v).sum()
    }
}

/// Returns the year encoded in a sheet name, if the name is exactly four digits.
pub fn sheet_year(name: &str) -> Option<i32> {
    let name = name.trim();
    if name.len() == 4 && name.chars().all(|c| c.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Text content of a cell, for label matching. Numbers are not labels.
fn cell_text(cell: &Data) -> Option<&str> {
    match cell {
        Data::String(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Converts a cell to an amount.
///
/// `Ok(None)` for blank cells; `Err` carries the cell's text when it is neither
/// blank nor numeric.
pub fn cell_amount(cell: &Data) -> Result<Option<Decimal>, String> {
    match cell {
        Data::Empty => Ok(None),
        Data::Int(i) => Ok(Some(Decimal::from(*i))),
        Data::Float(f) => Decimal::from_f64(*f)
            .map(Some)
            .ok_or_else(|| f.to_string()),
        Data::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() || cleaned == "-" {
                return Ok(None);
            }
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .map(Some)
                .map_err(|_| s.clone())
        }
        other => Err(other.to_string()),
    }
}

/// Finds the first row that contains a January header and maps its columns.
pub fn locate_header(rows: &[Vec<Data>]) -> Option<HeaderLayout> {
    let row = rows.iter().position(|cells| {
        cells
            .iter()
            .filter_map(cell_text)
            .any(|text| Month::from_label(text) == Some(Month::January))
    })?;

    let mut month_columns = Vec::new();
    let mut total_column = None;
    for (col, cell) in rows[row].iter().enumerate() {
        let Some(text) = cell_text(cell) else { continue };
        if let Some(month) = Month::from_label(text) {
            if !month_columns.iter().any(|(m, _)| *m == month) {
                month_columns.push((month, col));
            }
        } else if total_column.is_none() && normalize_label(text) == TOTAL_COLUMN_LABEL {
            total_column = Some(col);
        }
    }
    month_columns.sort_by_key(|(m, _)| *m);

    Some(HeaderLayout {
        row,
        month_columns,
        total_column,
    })
}

/// Finds the "Total general" row below the header, tolerant to case and spacing.
pub fn locate_total_row(rows: &[Vec<Data>], after: usize) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(after + 1)
        .find(|(_, cells)| {
            cells
                .iter()
                .filter_map(cell_text)
                .any(|text| normalize_label(text).contains(TOTAL_ROW_LABEL))
        })
        .map(|(idx, _)| idx)
}

/// Parses one yearly worksheet of the national-total workbooks.
pub fn parse_year_sheet(
    sheet: &str,
    year: i32,
    flow: Flow,
    rows: &[Vec<Data>],
) -> Result<ParsedSheet, ParseError> {
    let layout = locate_header(rows).ok_or_else(|| ParseError::HeaderNotFound {
        sheet: sheet.to_string(),
        year,
    })?;

    let mut missing: Vec<String> = Month::ALL
        .iter()
        .filter(|m| !layout.month_columns.iter().any(|(found, _)| found == *m))
        .map(|m| m.label().to_string())
        .collect();
    if layout.total_column.is_none() {
        missing.push("Total".to_string());
    }
    if !missing.is_empty() {
        return Err(ParseError::IncompleteHeader {
            sheet: sheet.to_string(),
            year,
            missing,
        });
    }

    let total_row = locate_total_row(rows, layout.row).ok_or_else(|| {
        ParseError::TotalRowNotFound {
            sheet: sheet.to_string(),
            year,
        }
    })?;

    let read = |column: usize| -> Result<Option<Decimal>, ParseError> {
        let cell = rows[total_row].get(column).unwrap_or(&Data::Empty);
        cell_amount(cell).map_err(|value| ParseError::InvalidCell {
            sheet: sheet.to_string(),
            year,
            row: total_row,
            column,
            value,
        })
    };

    let months = layout
        .month_columns
        .iter()
        .map(|(month, col)| Ok((*month, read(*col)?)))
        .collect::<Result<Vec<_>, ParseError>>()?;

    // The total column was checked above.
    let total_column = layout.total_column.unwrap_or_default();
    let annual_total = read(total_column)?.unwrap_or(Decimal::ZERO);

    tracing::debug!(
        sheet,
        year,
        %flow,
        header_row = layout.row,
        total_row,
        "Parsed year sheet."
    );

    Ok(ParsedSheet {
        sheet: sheet.to_string(),
        year,
        flow,
        months,
        annual_total,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    /// A sheet laid out like the customs workbooks: a title, a blank line, the
    /// header, a couple of detail rows and the "Total general" row.
    pub fn national_sheet(values: [f64; 12], total: f64) -> Vec<Vec<Data>> {
        let mut header = vec![Data::Empty, text("Concepto")];
        header.extend(Month::ALL.iter().map(|m| text(m.label())));
        header.push(text("Total"));

        let mut detail = vec![Data::Empty, text("Bienes de consumo")];
        detail.extend(values.iter().map(|v| Data::Float(v / 2.0)));
        detail.push(Data::Float(total / 2.0));

        let mut totals = vec![Data::Empty, text("  TOTAL   General ")];
        totals.extend(values.iter().map(|v| Data::Float(*v)));
        totals.push(Data::Float(total));

        vec![
            vec![text("Importaciones según uso o destino económico")],
            vec![],
            header,
            detail,
            totals,
        ]
    }

    #[test]
    fn sheet_names_must_be_four_digit_years() {
        assert_eq!(sheet_year("2014"), Some(2014));
        assert_eq!(sheet_year(" 2014 "), Some(2014));
        assert_eq!(sheet_year("Notas"), None);
        assert_eq!(sheet_year("2014a"), None);
        assert_eq!(sheet_year("201"), None);
    }

    #[test]
    fn parses_months_and_total() {
        let rows = national_sheet([10.0; 12], 120.0);
        let parsed = parse_year_sheet("2010", 2010, Flow::Export, &rows).unwrap();
        assert_eq!(parsed.months.len(), 12);
        assert_eq!(parsed.months[0], (Month::January, Some(dec!(10))));
        assert_eq!(parsed.months[11].0, Month::December);
        assert_eq!(parsed.annual_total, dec!(120));
        assert_eq!(parsed.monthly_sum(), dec!(120));
    }

    #[test]
    fn missing_total_row_is_a_parse_error() {
        let mut rows = national_sheet([1.0; 12], 12.0);
        rows.pop();
        let err = parse_year_sheet("2011", 2011, Flow::Import, &rows).unwrap_err();
        assert_eq!(
            err,
            ParseError::TotalRowNotFound {
                sheet: "2011".to_string(),
                year: 2011
            }
        );
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let rows = vec![vec![text("Total general"), Data::Float(1.0)]];
        let err = parse_year_sheet("2012", 2012, Flow::Import, &rows).unwrap_err();
        assert!(matches!(err, ParseError::HeaderNotFound { year: 2012, .. }));
        assert_eq!(err.sheet(), "2012");
    }

    #[test]
    fn incomplete_header_lists_missing_columns() {
        let mut rows = national_sheet([1.0; 12], 12.0);
        rows[2].pop(); // drop "Total"
        rows[2][13] = text("Diciembre (p)");
        let err = parse_year_sheet("2013", 2013, Flow::Export, &rows).unwrap_err();
        match err {
            ParseError::IncompleteHeader { missing, .. } => {
                assert_eq!(missing, vec!["Diciembre".to_string(), "Total".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_months_are_not_reported() {
        let mut rows = national_sheet([5.0; 12], 30.0);
        for col in 8..14 {
            rows[4][col] = Data::Empty;
        }
        let parsed = parse_year_sheet("2025", 2025, Flow::Export, &rows).unwrap();
        assert_eq!(parsed.reported_months().count(), 6);
        assert_eq!(parsed.months[6], (Month::July, None));
        assert_eq!(parsed.monthly_sum(), dec!(30));
    }

    #[test]
    fn text_cells_with_separators_are_amounts() {
        assert_eq!(cell_amount(&text("1,234.50")).unwrap(), Some(dec!(1234.50)));
        assert_eq!(cell_amount(&text(" - ")).unwrap(), None);
        assert_eq!(cell_amount(&Data::Int(7)).unwrap(), Some(dec!(7)));
        assert!(cell_amount(&text("n.d.")).is_err());
    }

    #[test]
    fn non_numeric_month_cell_is_reported() {
        let mut rows = national_sheet([5.0; 12], 60.0);
        rows[4][3] = text("s/d");
        let err = parse_year_sheet("2009", 2009, Flow::Import, &rows).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCell { row: 4, column: 3, .. }));
    }
}
