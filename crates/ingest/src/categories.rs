//! Per-category worksheets: same header layout as the national sheets, with one
//! row per product category below it.

use crate::error::ParseError;
use crate::sheet::{cell_amount, locate_header};
use calamine::Data;
use core_types::{CategoryTradeRecord, Flow, TradeMonth};

/// Category rows begin this many rows below the header (units and a blank line sit between).
const FIRST_CATEGORY_OFFSET: usize = 3;
const MIN_LABEL_LEN: usize = 3;
/// Column holding the category name; narrower sheets keep it in the first column.
const LABEL_COLUMN: usize = 2;

fn category_label(row: &[Data]) -> Option<String> {
    let column = if row.len() > LABEL_COLUMN { LABEL_COLUMN } else { 0 };
    let label = match row.get(column)? {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => return None,
        other => other.to_string().trim().to_string(),
    };

    let lowered = label.to_lowercase();
    if label.chars().count() < MIN_LABEL_LEN
        || lowered.starts_with("incluye")
        || lowered.starts_with("total")
    {
        return None;
    }
    Some(label)
}

/// Parses every category row of one yearly sheet.
///
/// Only a header row is required; whatever month and "Total" columns it has are
/// mapped. Blank, zero and non-numeric cells produce no record.
pub fn parse_category_sheet(
    sheet: &str,
    year: i32,
    flow: Flow,
    rows: &[Vec<Data>],
) -> Result<Vec<CategoryTradeRecord>, ParseError> {
    let layout = locate_header(rows).ok_or_else(|| ParseError::HeaderNotFound {
        sheet: sheet.to_string(),
        year,
    })?;

    let mut columns: Vec<(TradeMonth, usize)> = layout
        .month_columns
        .iter()
        .map(|(m, col)| (TradeMonth::Month(*m), *col))
        .collect();
    if let Some(col) = layout.total_column {
        columns.push((TradeMonth::Total, col));
    }

    let mut records = Vec::new();
    let mut categories = 0usize;
    for row in rows.iter().skip(layout.row + FIRST_CATEGORY_OFFSET) {
        let Some(category) = category_label(row) else {
            continue;
        };
        categories += 1;

        for (month, col) in &columns {
            let cell = row.get(*col).unwrap_or(&Data::Empty);
            let usd = match cell_amount(cell) {
                Ok(Some(v)) if !v.is_zero() => v,
                Ok(_) => continue,
                Err(value) => {
                    tracing::debug!(sheet, %category, column = col, %value, "Skipping non-numeric cell.");
                    continue;
                }
            };
            records.push(CategoryTradeRecord {
                year,
                month: *month,
                flow,
                category: category.clone(),
                usd,
            });
        }
    }

    tracing::debug!(sheet, year, %flow, categories, records = records.len(), "Parsed category sheet.");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::tests::text;
    use core_types::Month;
    use rust_decimal_macros::dec;

    fn category_row(label: &str, values: &[f64]) -> Vec<Data> {
        let mut row = vec![Data::Empty, Data::Empty, text(label)];
        row.extend(values.iter().map(|v| Data::Float(*v)));
        row
    }

    fn category_sheet() -> Vec<Vec<Data>> {
        let mut header = vec![Data::Empty, Data::Empty, text("Producto")];
        header.extend(
            [Month::January, Month::February, Month::March]
                .iter()
                .map(|m| text(m.label())),
        );
        header.push(text("Total"));

        vec![
            vec![text("Exportaciones por producto")],
            header,
            vec![text("(millones de US$)")],
            vec![],
            category_row("Cobre", &[10.0, 20.0, 0.0, 30.0]),
            category_row("Incluye refinados", &[1.0, 1.0, 1.0, 3.0]),
            category_row("Oro", &[5.0, 5.0, 5.0, 15.0]),
            category_row("ab", &[1.0, 1.0, 1.0, 3.0]),
            category_row("TOTAL", &[15.0, 25.0, 5.0, 45.0]),
            vec![Data::Empty, Data::Empty, text("Café"), text("n.d."), Data::Empty, Data::Float(2.0)],
        ]
    }

    #[test]
    fn extracts_category_rows_below_the_header() {
        let records = parse_category_sheet("2019", 2019, Flow::Export, &category_sheet()).unwrap();

        let categories: std::collections::BTreeSet<_> =
            records.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories.into_iter().collect::<Vec<_>>(), vec!["Café", "Cobre", "Oro"]);

        let cobre: Vec<_> = records.iter().filter(|r| r.category == "Cobre").collect();
        // March is zero and yields no record.
        assert_eq!(cobre.len(), 3);
        assert_eq!(cobre[0].month, TradeMonth::Month(Month::January));
        assert_eq!(cobre[2].month, TradeMonth::Total);
        assert_eq!(cobre[2].usd, dec!(30));
    }

    #[test]
    fn non_numeric_and_blank_cells_are_skipped() {
        let records = parse_category_sheet("2019", 2019, Flow::Export, &category_sheet()).unwrap();
        let cafe: Vec<_> = records.iter().filter(|r| r.category == "Café").collect();
        assert_eq!(cafe.len(), 1);
        assert_eq!(cafe[0].month, TradeMonth::Month(Month::March));
    }

    #[test]
    fn narrow_sheets_read_the_label_from_the_first_column() {
        let rows = vec![
            vec![text("Enero"), text("Total")],
            vec![],
            vec![],
            vec![text("Textiles")],
        ];
        let records = parse_category_sheet("2020", 2020, Flow::Import, &rows).unwrap();
        assert!(records.is_empty());
        assert_eq!(category_label(&rows[3]), Some("Textiles".to_string()));
    }

    #[test]
    fn sheet_without_header_fails() {
        let rows = vec![category_row("Cobre", &[1.0])];
        assert!(parse_category_sheet("2021", 2021, Flow::Import, &rows).is_err());
    }
}
