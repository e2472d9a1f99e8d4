use crate::error::AnalyticsError;
use crate::kpi::PivotPoint;
use crate::report::{
    EdaReport, Observation, Outlier, SeasonalGrid, SeasonalMean, TrendPoint,
};
use core_types::{KpiRecord, Month, Period};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeSet;

/// Builds the analysed series from KPI rows, keeping those with a defined balance.
pub fn observations_from_kpi(records: &[KpiRecord]) -> Vec<Observation> {
    records
        .iter()
        .filter_map(|r| {
            Some(Observation {
                period: r.period(),
                export: r.export_usd?.to_f64()?,
                import: r.import_usd?.to_f64()?,
                balance: r.balance?.to_f64()?,
            })
        })
        .collect()
}

/// Fallback used when no KPI table exists yet: the raw monthly pivot.
pub fn observations_from_pivot(points: &[PivotPoint]) -> Vec<Observation> {
    points
        .iter()
        .filter_map(|p| {
            let export = p.export_usd?.to_f64()?;
            let import = p.import_usd?.to_f64()?;
            Some(Observation {
                period: p.period,
                export,
                import,
                balance: export - import,
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n − 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Trailing mean over up to `window` values ending at each position. The
/// first positions average whatever history exists.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// A stateless calculator for the exploratory statistics of the monthly series.
#[derive(Debug, Clone)]
pub struct EdaAnalyzer {
    outlier_sigma: f64,
    outlier_window: usize,
}

impl Default for EdaAnalyzer {
    fn default() -> Self {
        Self {
            outlier_sigma: 2.0,
            outlier_window: 12,
        }
    }
}

impl EdaAnalyzer {
    pub fn new(outlier_sigma: f64, outlier_window: usize) -> Self {
        Self {
            outlier_sigma,
            outlier_window,
        }
    }

    /// The main entry point for the analysis.
    ///
    /// `observations` must be in ascending period order.
    pub fn analyze(&self, observations: &[Observation]) -> Result<EdaReport, AnalyticsError> {
        let Some(first) = observations.first() else {
            return Err(AnalyticsError::NotEnoughData(
                "no month with both flows reported".to_string(),
            ));
        };

        let exports: Vec<f64> = observations.iter().map(|o| o.export).collect();
        let export_mean = mean(&exports).unwrap_or_default();
        let export_std = sample_std(&exports);

        let (export_max_period, export_max) = observations.iter().fold(
            (first.period, first.export),
            |best, o| if o.export > best.1 { (o.period, o.export) } else { best },
        );

        let surplus_months = observations.iter().filter(|o| o.balance > 0.0).count();

        let seasonal_means = self.seasonal_means(observations);
        let by_mean = |a: &&SeasonalMean, b: &&SeasonalMean| a.mean_export.total_cmp(&b.mean_export);
        // Ties resolve to the earliest month.
        let peak_month = seasonal_means
            .iter()
            .rev()
            .max_by(by_mean)
            .map(|s| s.month)
            .unwrap_or(first.period.month);
        let trough_month = seasonal_means
            .iter()
            .min_by(by_mean)
            .map(|s| s.month)
            .unwrap_or(first.period.month);

        let outlier_threshold = export_std.map(|s| s * self.outlier_sigma);
        let outliers = match outlier_threshold {
            Some(threshold) => self.outliers(observations, &exports, threshold),
            None => Vec::new(),
        };

        let ma12 = rolling_mean(&exports, 12);
        let ma24 = rolling_mean(&exports, 24);
        let trend = observations
            .iter()
            .enumerate()
            .map(|(i, o)| TrendPoint {
                period: o.period,
                export: o.export,
                ma12: ma12[i],
                ma24: ma24[i],
            })
            .collect();

        let export_yoy = (0..exports.len())
            .map(|i| {
                let previous = *exports.get(i.checked_sub(12)?)?;
                (previous != 0.0).then(|| (exports[i] / previous - 1.0) * 100.0)
            })
            .collect();

        tracing::debug!(
            months = observations.len(),
            outliers = outliers.len(),
            "Computed exploratory statistics."
        );

        Ok(EdaReport {
            observations: observations.to_vec(),
            export_mean,
            export_std,
            export_max,
            export_max_period,
            surplus_months,
            total_months: observations.len(),
            seasonal_means,
            peak_month,
            trough_month,
            seasonal_grid: seasonal_grid(observations),
            outlier_threshold,
            outliers,
            trend,
            export_yoy,
        })
    }

    fn seasonal_means(&self, observations: &[Observation]) -> Vec<SeasonalMean> {
        Month::ALL
            .iter()
            .filter_map(|month| {
                let values: Vec<f64> = observations
                    .iter()
                    .filter(|o| o.period.month == *month)
                    .map(|o| o.export)
                    .collect();
                Some(SeasonalMean {
                    month: *month,
                    mean_export: mean(&values)?,
                    observations: values.len(),
                })
            })
            .collect()
    }

    /// |export − trailing mean| above the threshold. The threshold comes from the
    /// global standard deviation, so a strongly trending series can be over-flagged.
    fn outliers(&self, observations: &[Observation], exports: &[f64], threshold: f64) -> Vec<Outlier> {
        let rolling = rolling_mean(exports, self.outlier_window);
        observations
            .iter()
            .zip(rolling)
            .filter_map(|(o, rolling_mean)| {
                let deviation = o.export - rolling_mean;
                (deviation.abs() > threshold).then_some(Outlier {
                    period: o.period,
                    export: o.export,
                    rolling_mean,
                    deviation,
                })
            })
            .collect()
    }
}

fn seasonal_grid(observations: &[Observation]) -> SeasonalGrid {
    let years: Vec<i32> = observations
        .iter()
        .map(|o| o.period.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values = Month::ALL
        .iter()
        .map(|month| {
            years
                .iter()
                .map(|year| {
                    let period = Period::new(*year, *month);
                    observations
                        .iter()
                        .find(|o| o.period == period)
                        .map(|o| o.export)
                })
                .collect()
        })
        .collect();

    SeasonalGrid { years, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn obs(index: usize, export: f64, import: f64) -> Observation {
        Observation {
            period: Period::new(2005 + (index / 12) as i32, Month::ALL[index % 12]),
            export,
            import,
            balance: export - import,
        }
    }

    fn flat_series(n: usize) -> Vec<Observation> {
        (0..n).map(|i| obs(i, 100.0, 90.0)).collect()
    }

    #[test]
    fn empty_series_is_an_error() {
        assert!(matches!(
            EdaAnalyzer::default().analyze(&[]),
            Err(AnalyticsError::NotEnoughData(_))
        ));
    }

    #[test]
    fn descriptive_statistics() {
        let series = vec![obs(0, 100.0, 120.0), obs(1, 300.0, 100.0), obs(2, 200.0, 150.0)];
        let report = EdaAnalyzer::default().analyze(&series).unwrap();

        assert_eq!(report.export_mean, 200.0);
        assert_eq!(report.export_std, Some(100.0));
        assert_eq!(report.export_max, 300.0);
        assert_eq!(report.export_max_period.label(), "2005-02");
        assert_eq!(report.surplus_months, 2);
        assert_eq!(report.total_months, 3);
        assert!((report.surplus_share() - 66.666).abs() < 0.01);
    }

    #[test]
    fn peak_and_trough_by_mean_export_per_month() {
        let mut series = Vec::new();
        for i in 0..24 {
            let month = Month::ALL[i % 12];
            let export = match month {
                Month::December => 500.0,
                Month::February => 10.0,
                _ => 100.0,
            };
            series.push(obs(i, export, 50.0));
        }
        let report = EdaAnalyzer::default().analyze(&series).unwrap();
        assert_eq!(report.peak_month, Month::December);
        assert_eq!(report.trough_month, Month::February);
        assert_eq!(report.seasonal_means.len(), 12);
        assert_eq!(report.seasonal_grid.years, vec![2005, 2006]);
        assert_eq!(report.seasonal_grid.values[11], vec![Some(500.0), Some(500.0)]);
    }

    #[test]
    fn a_spike_is_flagged_against_its_trailing_mean() {
        let mut series = flat_series(36);
        series[30].export = 1000.0;
        series[30].balance = 910.0;
        let report = EdaAnalyzer::default().analyze(&series).unwrap();

        assert_eq!(report.outliers.len(), 1);
        let outlier = report.outliers[0];
        assert_eq!(outlier.period, series[30].period);
        assert!(outlier.deviation > 0.0);
        assert!(report.outlier_threshold.unwrap() > 0.0);
    }

    #[test]
    fn constant_series_has_no_outliers() {
        let report = EdaAnalyzer::default().analyze(&flat_series(24)).unwrap();
        assert_eq!(report.export_std, Some(0.0));
        assert!(report.outliers.is_empty());
    }

    #[test]
    fn trend_averages_allow_partial_windows() {
        let series: Vec<_> = (0..3).map(|i| obs(i, (i + 1) as f64 * 10.0, 0.0)).collect();
        let report = EdaAnalyzer::default().analyze(&series).unwrap();
        assert_eq!(report.trend[0].ma12, 10.0);
        assert_eq!(report.trend[2].ma12, 20.0);
        assert_eq!(report.trend[2].ma24, 20.0);
        assert!(report.export_yoy.iter().all(Option::is_none));
    }

    #[test]
    fn kpi_rows_without_balance_are_left_out() {
        let full = KpiRecord {
            year: 2020,
            month: Month::January,
            export_usd: Some(dec!(10)),
            import_usd: Some(dec!(4)),
            balance: Some(dec!(6)),
            export_mom: None,
            export_yoy: None,
            import_mom: None,
            import_yoy: None,
            export_ma3: None,
            import_ma3: None,
            balance_ma3: None,
            export_index: None,
            import_index: None,
            coverage_ratio: None,
        };
        let partial = KpiRecord {
            month: Month::February,
            import_usd: None,
            balance: None,
            ..full.clone()
        };
        let observations = observations_from_kpi(&[full, partial]);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].balance, 6.0);
    }

    #[test]
    fn rolling_mean_is_trailing() {
        assert_eq!(rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.0, 1.5, 2.5, 3.5]);
    }
}
