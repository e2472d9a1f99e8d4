use core_types::{
    CategoryKpiRecord, CategoryTradeRecord, Flow, KpiRecord, Period, TradeMonth, TradeRecord,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One period of the monthly pivot: both flows side by side.
///
/// A flow that was not reported for the period is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotPoint {
    pub period: Period,
    pub export_usd: Option<Decimal>,
    pub import_usd: Option<Decimal>,
}

/// Pivots the long-format table into one point per reported (year, month),
/// ascending by (year, month_num). Annual sentinels are ignored.
pub fn pivot_national(records: &[TradeRecord]) -> Vec<PivotPoint> {
    let mut points: BTreeMap<Period, PivotPoint> = BTreeMap::new();
    for record in records {
        let TradeMonth::Month(month) = record.month else {
            continue;
        };
        let period = Period::new(record.year, month);
        let point = points.entry(period).or_insert(PivotPoint {
            period,
            export_usd: None,
            import_usd: None,
        });
        let slot = match record.flow {
            Flow::Export => &mut point.export_usd,
            Flow::Import => &mut point.import_usd,
        };
        *slot = Some(slot.unwrap_or_default() + record.usd);
    }
    points.into_values().collect()
}

/// Pivots the category table, one series per category.
///
/// Zero cells never produce a category record, so a flow missing for a
/// category's period counts as zero rather than unknown.
pub fn pivot_categories(records: &[CategoryTradeRecord]) -> BTreeMap<String, Vec<PivotPoint>> {
    let mut grouped: BTreeMap<&str, BTreeMap<Period, (Decimal, Decimal)>> = BTreeMap::new();
    for record in records {
        let TradeMonth::Month(month) = record.month else {
            continue;
        };
        let entry = grouped
            .entry(record.category.as_str())
            .or_default()
            .entry(Period::new(record.year, month))
            .or_default();
        match record.flow {
            Flow::Export => entry.0 += record.usd,
            Flow::Import => entry.1 += record.usd,
        }
    }

    grouped
        .into_iter()
        .map(|(category, periods)| {
            let series = periods
                .into_iter()
                .map(|(period, (export, import))| PivotPoint {
                    period,
                    export_usd: Some(export),
                    import_usd: Some(import),
                })
                .collect();
            (category.to_string(), series)
        })
        .collect()
}

/// Percentage change `(current / previous − 1) × 100`.
///
/// `None` when either side is missing, the denominator is zero, or the
/// result falls outside the `Decimal` range.
pub fn pct_change(current: Option<Decimal>, previous: Option<Decimal>) -> Option<Decimal> {
    current?
        .checked_div(previous?)?
        .checked_sub(Decimal::ONE)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// Mean of the `window` values ending at `end`. `None` until the window is
/// full, and whenever a value inside it is missing.
pub fn trailing_mean(values: &[Option<Decimal>], end: usize, window: usize) -> Option<Decimal> {
    if window == 0 || end + 1 < window {
        return None;
    }
    let mut sum = Decimal::ZERO;
    for value in &values[end + 1 - window..=end] {
        sum = sum.checked_add((*value)?)?;
    }
    Some(sum / Decimal::from(window))
}

fn ratio_index(value: Option<Decimal>, base: Option<Decimal>) -> Option<Decimal> {
    value?.checked_div(base?)?.checked_mul(Decimal::ONE_HUNDRED)
}

fn difference(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    a?.checked_sub(b?)
}

fn lagged(values: &[Option<Decimal>], i: usize, lag: usize) -> Option<Decimal> {
    i.checked_sub(lag).and_then(|j| values[j])
}

/// How the base period of the index is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBase {
    /// The first row of the series, whatever its value.
    FirstPeriod,
    /// The first strictly positive value of the series.
    FirstPositive,
}

/// A stateless calculator deriving monthly KPIs from the pivoted series.
///
/// Windows run over the series in (year, month_num) order with SQL `LAG`
/// semantics: the row `n` positions back, not the calendar month `n` months back.
#[derive(Debug, Clone)]
pub struct KpiCalculator {
    moving_average_window: usize,
    yoy_lag: usize,
}

impl Default for KpiCalculator {
    fn default() -> Self {
        Self {
            moving_average_window: 3,
            yoy_lag: 12,
        }
    }
}

impl KpiCalculator {
    pub fn new(moving_average_window: usize, yoy_lag: usize) -> Self {
        Self {
            moving_average_window,
            yoy_lag,
        }
    }

    /// The main entry point: one `KpiRecord` per pivot point, in the same order.
    pub fn calculate(&self, series: &[PivotPoint]) -> Vec<KpiRecord> {
        self.calculate_with_base(series, IndexBase::FirstPeriod)
    }

    /// KPIs per category; every window is partitioned by category and the
    /// index of each category is based on its first positive value.
    pub fn calculate_categories(&self, records: &[CategoryTradeRecord]) -> Vec<CategoryKpiRecord> {
        pivot_categories(records)
            .into_iter()
            .flat_map(|(category, series)| {
                self.calculate_with_base(&series, IndexBase::FirstPositive)
                    .into_iter()
                    .map(move |kpi| CategoryKpiRecord {
                        category: category.clone(),
                        kpi,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn calculate_with_base(&self, series: &[PivotPoint], base: IndexBase) -> Vec<KpiRecord> {
        let exports: Vec<Option<Decimal>> = series.iter().map(|p| p.export_usd).collect();
        let imports: Vec<Option<Decimal>> = series.iter().map(|p| p.import_usd).collect();
        let balances: Vec<Option<Decimal>> = exports
            .iter()
            .zip(&imports)
            .map(|(e, i)| difference(*e, *i))
            .collect();

        let base_of = |values: &[Option<Decimal>]| match base {
            IndexBase::FirstPeriod => values.first().copied().flatten(),
            IndexBase::FirstPositive => values
                .iter()
                .flatten()
                .find(|v| v.is_sign_positive() && !v.is_zero())
                .copied(),
        };
        let export_base = base_of(&exports[..]);
        let import_base = base_of(&imports[..]);

        let window = self.moving_average_window;
        series
            .iter()
            .enumerate()
            .map(|(i, point)| KpiRecord {
                year: point.period.year,
                month: point.period.month,
                export_usd: exports[i],
                import_usd: imports[i],
                balance: balances[i],
                export_mom: pct_change(exports[i], lagged(&exports, i, 1)),
                export_yoy: pct_change(exports[i], lagged(&exports, i, self.yoy_lag)),
                import_mom: pct_change(imports[i], lagged(&imports, i, 1)),
                import_yoy: pct_change(imports[i], lagged(&imports, i, self.yoy_lag)),
                export_ma3: trailing_mean(&exports, i, window),
                import_ma3: trailing_mean(&imports, i, window),
                balance_ma3: trailing_mean(&balances, i, window),
                export_index: ratio_index(exports[i], export_base),
                import_index: ratio_index(imports[i], import_base),
                coverage_ratio: ratio_index(exports[i], imports[i])
                    .map(|pct| pct / Decimal::ONE_HUNDRED),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Month;
    use rust_decimal_macros::dec;

    fn series(exports: &[Option<Decimal>], import: Decimal) -> Vec<PivotPoint> {
        exports
            .iter()
            .enumerate()
            .map(|(i, e)| PivotPoint {
                period: Period::new(2005 + (i / 12) as i32, Month::ALL[i % 12]),
                export_usd: *e,
                import_usd: Some(import),
            })
            .collect()
    }

    #[test]
    fn mom_and_moving_average_follow_the_worked_example() {
        let points = series(&[Some(dec!(100)), Some(dec!(110)), Some(dec!(121))], dec!(50));
        let kpis = KpiCalculator::default().calculate(&points);

        assert_eq!(kpis[0].export_mom, None);
        assert_eq!(kpis[1].export_mom, Some(dec!(10)));
        assert_eq!(kpis[2].export_mom, Some(dec!(10.0)));

        assert_eq!(kpis[0].export_ma3, None);
        assert_eq!(kpis[1].export_ma3, None);
        let ma = kpis[2].export_ma3.unwrap();
        assert_eq!(ma.round_dp(2), dec!(110.33));
    }

    #[test]
    fn balance_and_deficit() {
        let points = series(&[Some(dec!(100))], dec!(120));
        let kpi = &KpiCalculator::default().calculate(&points)[0];
        assert_eq!(kpi.balance, Some(dec!(-20)));
        assert_eq!(kpi.coverage_ratio.unwrap().round_dp(4), dec!(0.8333));
    }

    #[test]
    fn yoy_needs_twelve_prior_rows() {
        let exports: Vec<_> = (0..14).map(|i| Some(Decimal::from(100 + i))).collect();
        let kpis = KpiCalculator::default().calculate(&series(&exports, dec!(1)));

        assert!(kpis[..12].iter().all(|k| k.export_yoy.is_none()));
        // 112 vs 100
        assert_eq!(kpis[12].export_yoy, Some(dec!(12)));
        assert_eq!(
            kpis[13].export_yoy,
            Some((dec!(113) / dec!(101) - dec!(1)) * dec!(100))
        );
        assert!(kpis[12].import_yoy.is_some());
    }

    #[test]
    fn index_is_one_hundred_at_the_base_period() {
        let points = series(&[Some(dec!(80)), Some(dec!(120)), Some(dec!(40))], dec!(10));
        let kpis = KpiCalculator::default().calculate(&points);
        assert_eq!(kpis[0].export_index, Some(dec!(100)));
        assert_eq!(kpis[1].export_index, Some(dec!(150)));
        assert_eq!(kpis[2].export_index, Some(dec!(50)));
        assert_eq!(kpis[2].import_index, Some(dec!(100)));
    }

    #[test]
    fn zero_or_missing_denominators_yield_null() {
        let points = series(&[Some(dec!(0)), Some(dec!(10)), None, Some(dec!(5))], dec!(0));
        let kpis = KpiCalculator::default().calculate(&points);

        assert_eq!(kpis[1].export_mom, None); // previous is zero
        assert_eq!(kpis[2].export_mom, None); // current missing
        assert_eq!(kpis[3].export_mom, None); // previous missing
        assert_eq!(kpis[3].export_ma3, None); // gap inside the window
        assert_eq!(kpis[1].export_index, None); // zero base
        assert_eq!(kpis[1].coverage_ratio, None);
        assert_eq!(kpis[2].balance, None);
    }

    #[test]
    fn out_of_range_ratios_yield_null() {
        let tiny = Decimal::new(1, 28);
        assert_eq!(pct_change(Some(Decimal::MAX), Some(tiny)), None);
        assert_eq!(ratio_index(Some(Decimal::MAX), Some(tiny)), None);
        assert_eq!(ratio_index(Some(dec!(5)), Some(dec!(0))), None);

        let points = series(&[Some(tiny), Some(Decimal::MAX)], dec!(1));
        let kpis = KpiCalculator::default().calculate(&points);
        assert_eq!(kpis[1].export_mom, None);
        assert_eq!(kpis[1].export_index, None);
        assert_eq!(kpis[0].export_index, Some(dec!(100)));
    }

    #[test]
    fn pivot_skips_sentinels_and_orders_by_period() {
        let records = vec![
            TradeRecord::new(2006, TradeMonth::Month(Month::January), Flow::Export, dec!(3)),
            TradeRecord::new(2005, TradeMonth::Month(Month::December), Flow::Import, dec!(2)),
            TradeRecord::new(2005, TradeMonth::Month(Month::December), Flow::Export, dec!(1)),
            TradeRecord::new(2005, TradeMonth::Total, Flow::Export, dec!(99)),
        ];
        let pivot = pivot_national(&records);
        assert_eq!(pivot.len(), 2);
        assert_eq!(pivot[0].period, Period::new(2005, Month::December));
        assert_eq!(pivot[0].export_usd, Some(dec!(1)));
        assert_eq!(pivot[0].import_usd, Some(dec!(2)));
        assert_eq!(pivot[1].import_usd, None);
    }

    #[test]
    fn category_windows_do_not_leak_across_categories() {
        let record = |category: &str, month: Month, flow: Flow, usd: Decimal| CategoryTradeRecord {
            year: 2010,
            month: TradeMonth::Month(month),
            flow,
            category: category.to_string(),
            usd,
        };
        let records = vec![
            record("Cobre", Month::January, Flow::Export, dec!(100)),
            record("Cobre", Month::February, Flow::Export, dec!(150)),
            record("Oro", Month::January, Flow::Export, dec!(0)),
            record("Oro", Month::February, Flow::Export, dec!(40)),
            record("Oro", Month::March, Flow::Export, dec!(60)),
            record("Oro", Month::March, Flow::Import, dec!(30)),
            record("Oro", Month::March, Flow::Export, dec!(0)),
        ];
        let kpis = KpiCalculator::default().calculate_categories(&records);
        assert_eq!(kpis.len(), 5);

        let oro: Vec<_> = kpis.iter().filter(|k| k.category == "Oro").collect();
        assert_eq!(oro[0].kpi.export_mom, None);
        // First positive value (February) is the base.
        assert_eq!(oro[1].kpi.export_index, Some(dec!(100)));
        assert_eq!(oro[2].kpi.export_index, Some(dec!(150)));
        assert_eq!(oro[2].kpi.balance, Some(dec!(30)));
        assert_eq!(oro[2].kpi.coverage_ratio, Some(dec!(2)));
        // Missing import counts as zero.
        assert_eq!(oro[1].kpi.balance, Some(dec!(40)));

        let cobre: Vec<_> = kpis.iter().filter(|k| k.category == "Cobre").collect();
        assert_eq!(cobre[0].kpi.export_mom, None);
        assert_eq!(cobre[1].kpi.export_mom, Some(dec!(50)));
    }
}
