//! Unions parsed sheets of both flows into the normalized
//! (year, month, flow, usd) table.

use crate::sheet::ParsedSheet;
use core_types::{CategoryTradeRecord, Flow, TradeMonth, TradeRecord};
use std::collections::{BTreeMap, BTreeSet};

/// The long-format table produced by one ETL run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongTable {
    /// Ordered by (year, flow, month), the "Total" sentinel last within a year.
    pub records: Vec<TradeRecord>,
    /// Number of (year, month, flow) keys that were written more than once.
    pub duplicates: usize,
}

impl LongTable {
    /// Records excluding the annual sentinel rows.
    pub fn monthly(&self) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter().filter(|r| !r.is_total())
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.records.iter().map(|r| r.year).collect()
    }

    /// Years for which only one flow was parsed, with the flow that is present.
    pub fn unpaired_years(&self) -> Vec<(i32, Flow)> {
        let mut flows: BTreeMap<i32, BTreeSet<Flow>> = BTreeMap::new();
        for record in &self.records {
            flows.entry(record.year).or_default().insert(record.flow);
        }
        flows
            .into_iter()
            .filter(|(_, present)| present.len() == 1)
            .filter_map(|(year, present)| present.into_iter().next().map(|f| (year, f)))
            .collect()
    }
}

/// Accumulates sheets; last write wins on a repeated key.
#[derive(Debug, Default)]
pub struct LongFormatBuilder {
    rows: BTreeMap<(i32, Flow, u32), TradeRecord>,
    duplicates: usize,
}

impl LongFormatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TradeRecord) {
        let key = (record.year, record.flow, record.month.sort_key());
        if let Some(previous) = self.rows.insert(key, record) {
            self.duplicates += 1;
            tracing::warn!(
                year = previous.year,
                month = %previous.month,
                flow = %previous.flow,
                "Duplicate trade record, keeping the last one."
            );
        }
    }

    /// Adds the reported months of a sheet plus its annual "Total" row.
    pub fn push_sheet(&mut self, sheet: &ParsedSheet) {
        for (month, usd) in sheet.reported_months() {
            self.push(TradeRecord::new(
                sheet.year,
                TradeMonth::Month(month),
                sheet.flow,
                usd,
            ));
        }
        self.push(TradeRecord::new(
            sheet.year,
            TradeMonth::Total,
            sheet.flow,
            sheet.annual_total,
        ));
    }

    pub fn build(self) -> LongTable {
        LongTable {
            records: self.rows.into_values().collect(),
            duplicates: self.duplicates,
        }
    }
}

/// The category counterpart of [`LongFormatBuilder`].
#[derive(Debug, Default)]
pub struct CategoryTableBuilder {
    rows: BTreeMap<(i32, Flow, String, u32), CategoryTradeRecord>,
    duplicates: usize,
}

impl CategoryTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CategoryTradeRecord) {
        let key = (
            record.year,
            record.flow,
            record.category.clone(),
            record.month.sort_key(),
        );
        if let Some(previous) = self.rows.insert(key, record) {
            self.duplicates += 1;
            tracing::warn!(
                year = previous.year,
                month = %previous.month,
                flow = %previous.flow,
                category = %previous.category,
                "Duplicate category record, keeping the last one."
            );
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = CategoryTradeRecord>) {
        for record in records {
            self.push(record);
        }
    }

    /// Returns the records ordered by (year, flow, category, month) and the
    /// number of overwritten keys.
    pub fn build(self) -> (Vec<CategoryTradeRecord>, usize) {
        (self.rows.into_values().collect(), self.duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Month;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sheet(year: i32, flow: Flow, value: Decimal) -> ParsedSheet {
        ParsedSheet {
            sheet: year.to_string(),
            year,
            flow,
            months: Month::ALL.iter().map(|m| (*m, Some(value))).collect(),
            annual_total: value * Decimal::from(12),
        }
    }

    #[test]
    fn one_row_per_year_month_flow_plus_totals() {
        let mut builder = LongFormatBuilder::new();
        for year in [2005, 2006] {
            for flow in Flow::ALL {
                builder.push_sheet(&sheet(year, flow, dec!(10)));
            }
        }
        let table = builder.build();

        assert_eq!(table.records.len(), 2 * 2 * 13);
        assert_eq!(table.monthly().count(), 2 * 2 * 12);
        assert_eq!(table.duplicates, 0);
        assert!(table.unpaired_years().is_empty());

        let first = &table.records[0];
        assert_eq!((first.year, first.flow), (2005, Flow::Import));
        assert_eq!(first.month, TradeMonth::Month(Month::January));
        assert!(table.records[12].is_total());
    }

    #[test]
    fn duplicates_keep_the_last_value() {
        let mut builder = LongFormatBuilder::new();
        builder.push_sheet(&sheet(2007, Flow::Export, dec!(1)));
        builder.push_sheet(&sheet(2007, Flow::Export, dec!(2)));
        let table = builder.build();

        assert_eq!(table.records.len(), 13);
        assert_eq!(table.duplicates, 13);
        assert!(table.records.iter().all(|r| r.usd >= dec!(2)));
    }

    #[test]
    fn reports_years_missing_a_flow() {
        let mut builder = LongFormatBuilder::new();
        builder.push_sheet(&sheet(2008, Flow::Export, dec!(1)));
        builder.push_sheet(&sheet(2009, Flow::Export, dec!(1)));
        builder.push_sheet(&sheet(2009, Flow::Import, dec!(1)));
        let table = builder.build();

        assert_eq!(table.unpaired_years(), vec![(2008, Flow::Export)]);
        assert_eq!(table.years().len(), 2);
    }

    #[test]
    fn blank_months_are_left_out() {
        let mut partial = sheet(2025, Flow::Import, dec!(3));
        for entry in partial.months.iter_mut().skip(4) {
            entry.1 = None;
        }
        let mut builder = LongFormatBuilder::new();
        builder.push_sheet(&partial);
        let table = builder.build();
        assert_eq!(table.monthly().count(), 4);
        assert_eq!(table.records.len(), 5);
    }
}
