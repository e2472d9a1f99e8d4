use crate::enums::{Flow, Month, TradeMonth};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the long-format `trade` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub year: i32,
    pub month: TradeMonth,
    pub flow: Flow,
    /// Amount in US dollars, exactly as read from the workbook.
    pub usd: Decimal,
}

impl TradeRecord {
    pub fn new(year: i32, month: TradeMonth, flow: Flow, usd: Decimal) -> Self {
        Self {
            year,
            month,
            flow,
            usd,
        }
    }

    /// The annual sentinel row is kept for QA and excluded from analytics.
    pub fn is_total(&self) -> bool {
        self.month.is_total()
    }
}

/// One row of the per-category `trade_prod` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTradeRecord {
    pub year: i32,
    pub month: TradeMonth,
    pub flow: Flow,
    pub category: String,
    pub usd: Decimal,
}

/// A (year, month) position in the monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: Month,
}

impl Period {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// `YYYY-MM`, used for chart axes and summaries.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month.number())
    }
}

/// Derived monthly metrics for the national series, one per period.
///
/// Every metric is an `Option` because insufficient history or a zero
/// denominator yields an undefined value rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub year: i32,
    pub month: Month,
    pub export_usd: Option<Decimal>,
    pub import_usd: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub export_mom: Option<Decimal>,
    pub export_yoy: Option<Decimal>,
    pub import_mom: Option<Decimal>,
    pub import_yoy: Option<Decimal>,
    pub export_ma3: Option<Decimal>,
    pub import_ma3: Option<Decimal>,
    pub balance_ma3: Option<Decimal>,
    pub export_index: Option<Decimal>,
    pub import_index: Option<Decimal>,
    pub coverage_ratio: Option<Decimal>,
}

impl KpiRecord {
    pub fn period(&self) -> Period {
        Period::new(self.year, self.month)
    }

    pub fn month_num(&self) -> u32 {
        self.month.number()
    }
}

/// Per-category monthly metrics; windows are partitioned by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKpiRecord {
    pub category: String,
    #[serde(flatten)]
    pub kpi: KpiRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn period_label_is_zero_padded() {
        assert_eq!(Period::new(2005, Month::March).label(), "2005-03");
    }

    #[test]
    fn periods_order_chronologically() {
        let mut periods = vec![
            Period::new(2006, Month::January),
            Period::new(2005, Month::December),
            Period::new(2005, Month::February),
        ];
        periods.sort();
        assert_eq!(periods[0], Period::new(2005, Month::February));
        assert_eq!(periods[2], Period::new(2006, Month::January));
    }

    #[test]
    fn total_rows_are_flagged() {
        let total = TradeRecord::new(2010, TradeMonth::Total, Flow::Export, dec!(1200));
        let monthly = TradeRecord::new(2010, TradeMonth::Month(Month::May), Flow::Export, dec!(100));
        assert!(total.is_total());
        assert!(!monthly.is_total());
    }

    #[test]
    fn trade_record_serializes_lowercase_flow() {
        let record = TradeRecord::new(2010, TradeMonth::Month(Month::May), Flow::Import, dec!(1.5));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["flow"], "import");
    }
}
