use core_types::{Month, Period};
use serde::Serialize;

/// One month of the analysed series. Only months with both flows reported
/// (and therefore a defined balance) are analysed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub period: Period,
    pub export: f64,
    pub import: f64,
    pub balance: f64,
}

/// Mean export of one calendar month across all years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonalMean {
    pub month: Month,
    pub mean_export: f64,
    pub observations: usize,
}

/// A month whose export deviates from its trailing mean by more than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Outlier {
    pub period: Period,
    pub export: f64,
    pub rolling_mean: f64,
    /// `export − rolling_mean`, signed.
    pub deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: Period,
    pub export: f64,
    pub ma12: f64,
    pub ma24: f64,
}

/// Export values laid out as month (rows) by year (columns).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalGrid {
    pub years: Vec<i32>,
    /// Twelve rows, January first; `None` where the month was not reported.
    pub values: Vec<Vec<Option<f64>>>,
}

/// The standardized output of the exploratory analysis.
///
/// This struct is the final output of the `EdaAnalyzer` and feeds both the
/// narrative summary and every chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdaReport {
    pub observations: Vec<Observation>,

    // I. Descriptive statistics of exports
    pub export_mean: f64,
    pub export_std: Option<f64>, // None with fewer than two observations
    pub export_max: f64,
    pub export_max_period: Period,

    // II. Balance
    pub surplus_months: usize,
    pub total_months: usize,

    // III. Seasonality
    pub seasonal_means: Vec<SeasonalMean>,
    pub peak_month: Month,
    pub trough_month: Month,
    pub seasonal_grid: SeasonalGrid,

    // IV. Outliers and trend
    pub outlier_threshold: Option<f64>,
    pub outliers: Vec<Outlier>,
    pub trend: Vec<TrendPoint>,
    /// Export change against the observation twelve rows back, aligned with `observations`.
    pub export_yoy: Vec<Option<f64>>,
}

impl EdaReport {
    /// Share of surplus months, in percent.
    pub fn surplus_share(&self) -> f64 {
        if self.total_months == 0 {
            0.0
        } else {
            self.surplus_months as f64 / self.total_months as f64 * 100.0
        }
    }

    pub fn first_period(&self) -> Option<Period> {
        self.observations.first().map(|o| o.period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.observations.last().map(|o| o.period)
    }
}
