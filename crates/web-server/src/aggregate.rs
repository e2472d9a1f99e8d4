//! Filter-scoped aggregation for the dashboard. Every function here is pure:
//! the handlers load rows for the selected years and hand them over.

use analytics::eda::sample_std;
use core_types::Month;
use database::{CategoryKpiRow, KpiRow, PivotRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One month of the national series as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month_num: i32,
    pub month: String,
    pub export: Option<f64>,
    pub import: Option<f64>,
    pub balance: Option<f64>,
    pub export_index: Option<f64>,
    pub import_index: Option<f64>,
    pub export_mom: Option<f64>,
    pub import_mom: Option<f64>,
}

impl MonthlyPoint {
    pub fn period(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month_num)
    }
}

impl From<KpiRow> for MonthlyPoint {
    fn from(row: KpiRow) -> Self {
        Self {
            year: row.year,
            month_num: row.month_num,
            month: row.month,
            export: row.export_usd,
            import: row.import_usd,
            balance: row.balance,
            export_index: row.export_index,
            import_index: row.import_index,
            export_mom: row.export_mom,
            import_mom: row.import_mom,
        }
    }
}

/// Before the KPI step has run, only the raw pivot is available.
impl From<PivotRow> for MonthlyPoint {
    fn from(row: PivotRow) -> Self {
        let balance = row.export_usd.zip(row.import_usd).map(|(e, i)| e - i);
        Self {
            year: row.year,
            month_num: row.month_num,
            month: row.month,
            export: row.export_usd,
            import: row.import_usd,
            balance,
            export_index: None,
            import_index: None,
            export_mom: None,
            import_mom: None,
        }
    }
}

/// Which flows the charts show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowFilter {
    #[default]
    Both,
    Export,
    Import,
}

impl FlowFilter {
    fn shows_export(&self) -> bool {
        matches!(self, FlowFilter::Both | FlowFilter::Export)
    }

    fn shows_import(&self) -> bool {
        matches!(self, FlowFilter::Both | FlowFilter::Import)
    }
}

/// How the time series is expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    /// US dollars.
    #[default]
    Absolute,
    /// Base index, first period = 100.
    Index,
    /// Month-over-month percentage change.
    Pct,
}

/// Year-to-date figures of the latest year in the selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCards {
    pub year: i32,
    pub months: usize,
    pub export_ytd: f64,
    pub import_ytd: f64,
    pub balance_ytd: f64,
    /// Percent change against the previous year; `None` without a comparable year.
    pub export_change: Option<f64>,
    pub import_change: Option<f64>,
    /// Exports over imports, in percent.
    pub coverage: Option<f64>,
}

fn year_sums(points: &[MonthlyPoint], year: i32) -> Option<(f64, f64, usize)> {
    let rows: Vec<&MonthlyPoint> = points.iter().filter(|p| p.year == year).collect();
    if rows.is_empty() {
        return None;
    }
    let export = rows.iter().filter_map(|p| p.export).sum();
    let import = rows.iter().filter_map(|p| p.import).sum();
    Some((export, import, rows.len()))
}

fn pct_change(current: f64, previous: f64) -> Option<f64> {
    (previous > 0.0).then(|| (current / previous - 1.0) * 100.0)
}

pub fn metric_cards(points: &[MonthlyPoint]) -> Option<MetricCards> {
    let year = points.iter().map(|p| p.year).max()?;
    let (export_ytd, import_ytd, months) = year_sums(points, year)?;
    let previous = year_sums(points, year - 1);

    Some(MetricCards {
        year,
        months,
        export_ytd,
        import_ytd,
        balance_ytd: export_ytd - import_ytd,
        export_change: previous.and_then(|(e, _, _)| pct_change(export_ytd, e)),
        import_change: previous.and_then(|(_, i, _)| pct_change(import_ytd, i)),
        coverage: (import_ytd > 0.0).then(|| export_ytd / import_ytd * 100.0),
    })
}

/// Chart-ready series; a flow hidden by the filter is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub view: ViewType,
    pub periods: Vec<String>,
    pub export: Option<Vec<Option<f64>>>,
    pub import: Option<Vec<Option<f64>>>,
    /// Only in the absolute view with both flows shown.
    pub balance: Option<Vec<Option<f64>>>,
}

pub fn series(points: &[MonthlyPoint], flow: FlowFilter, view: ViewType) -> Series {
    let export_of = |p: &MonthlyPoint| match view {
        ViewType::Absolute => p.export,
        ViewType::Index => p.export_index,
        ViewType::Pct => p.export_mom,
    };
    let import_of = |p: &MonthlyPoint| match view {
        ViewType::Absolute => p.import,
        ViewType::Index => p.import_index,
        ViewType::Pct => p.import_mom,
    };

    Series {
        view,
        periods: points.iter().map(MonthlyPoint::period).collect(),
        export: flow
            .shows_export()
            .then(|| points.iter().map(export_of).collect()),
        import: flow
            .shows_import()
            .then(|| points.iter().map(import_of).collect()),
        balance: (flow == FlowFilter::Both && view == ViewType::Absolute)
            .then(|| points.iter().map(|p| p.balance).collect()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStats {
    pub month: &'static str,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// Export heatmap (month x year) plus the mean and spread of each month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seasonality {
    pub years: Vec<i32>,
    pub months: Vec<&'static str>,
    /// Twelve rows, January first, one column per year.
    pub values: Vec<Vec<Option<f64>>>,
    pub stats: Vec<MonthStats>,
}

pub fn seasonality(points: &[MonthlyPoint]) -> Seasonality {
    let years: Vec<i32> = points
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let by_period: BTreeMap<(i32, i32), f64> = points
        .iter()
        .filter_map(|p| Some(((p.year, p.month_num), p.export?)))
        .collect();

    let mut values = Vec::with_capacity(12);
    let mut stats = Vec::with_capacity(12);
    for month in Month::ALL {
        let number = month.number() as i32;
        let row: Vec<Option<f64>> = years
            .iter()
            .map(|year| by_period.get(&(*year, number)).copied())
            .collect();
        let present: Vec<f64> = row.iter().flatten().copied().collect();
        stats.push(MonthStats {
            month: month.label(),
            mean: (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64),
            std: sample_std(&present),
        });
        values.push(row);
    }

    Seasonality {
        years,
        months: Month::ALL.iter().map(Month::label).collect(),
        values,
        stats,
    }
}

/// The latest `limit` periods, oldest first.
pub fn detail(points: &[MonthlyPoint], limit: usize) -> &[MonthlyPoint] {
    &points[points.len().saturating_sub(limit)..]
}

/// The quantity categories are ranked and charted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMetric {
    #[default]
    Export,
    Import,
    Balance,
    Coverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRank {
    pub category: String,
    pub export: f64,
    pub import: f64,
    pub balance: f64,
    pub coverage: Option<f64>,
}

impl CategoryRank {
    fn value(&self, metric: CategoryMetric) -> Option<f64> {
        match metric {
            CategoryMetric::Export => Some(self.export),
            CategoryMetric::Import => Some(self.import),
            CategoryMetric::Balance => Some(self.balance),
            CategoryMetric::Coverage => self.coverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySeries {
    pub category: String,
    pub periods: Vec<String>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOverview {
    pub metric: CategoryMetric,
    /// Latest year of the selection; the top categories are chosen by its exports.
    pub year: Option<i32>,
    /// Totals of the selected categories in that year.
    pub totals: Option<CategoryRank>,
    pub ranking: Vec<CategoryRank>,
    pub series: Vec<CategorySeries>,
}

fn totals_by_category<'a>(rows: impl Iterator<Item = &'a CategoryKpiRow>) -> BTreeMap<String, (f64, f64)> {
    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.category.clone()).or_default();
        entry.0 += row.kpi.export_usd.unwrap_or_default();
        entry.1 += row.kpi.import_usd.unwrap_or_default();
    }
    totals
}

fn rank(category: String, export: f64, import: f64) -> CategoryRank {
    CategoryRank {
        category,
        export,
        import,
        balance: export - import,
        coverage: (import > 0.0).then(|| export / import * 100.0),
    }
}

/// Picks the `top` categories by exports in the latest year, then ranks them
/// by `metric` over the whole selection.
pub fn category_overview(rows: &[CategoryKpiRow], metric: CategoryMetric, top: usize) -> CategoryOverview {
    let Some(year) = rows.iter().map(|r| r.kpi.year).max() else {
        return CategoryOverview {
            metric,
            year: None,
            totals: None,
            ranking: Vec::new(),
            series: Vec::new(),
        };
    };

    let mut latest: Vec<(String, f64, f64)> = totals_by_category(rows.iter().filter(|r| r.kpi.year == year))
        .into_iter()
        .map(|(category, (e, i))| (category, e, i))
        .collect();
    latest.sort_by(|a, b| b.1.total_cmp(&a.1));
    latest.truncate(top);
    let selected: BTreeSet<&str> = latest.iter().map(|(c, _, _)| c.as_str()).collect();

    let (export, import) = latest
        .iter()
        .fold((0.0, 0.0), |(e, i), (_, le, li)| (e + le, i + li));
    let totals = rank("Selected categories".to_string(), export, import);

    let in_selection = || rows.iter().filter(|r| selected.contains(r.category.as_str()));
    let mut ranking: Vec<CategoryRank> = totals_by_category(in_selection())
        .into_iter()
        .map(|(category, (e, i))| rank(category, e, i))
        .collect();
    // Undefined coverage sorts last.
    ranking.sort_by(|a, b| {
        let key = |r: &CategoryRank| r.value(metric).unwrap_or(f64::NEG_INFINITY);
        key(b).total_cmp(&key(a))
    });

    let series = ranking
        .iter()
        .map(|r| {
            let rows: Vec<&CategoryKpiRow> = in_selection().filter(|row| row.category == r.category).collect();
            CategorySeries {
                category: r.category.clone(),
                periods: rows.iter().map(|row| row.kpi.period_label()).collect(),
                values: rows
                    .iter()
                    .map(|row| match metric {
                        CategoryMetric::Export => row.kpi.export_usd,
                        CategoryMetric::Import => row.kpi.import_usd,
                        CategoryMetric::Balance => row.kpi.balance,
                        CategoryMetric::Coverage => row.kpi.coverage_ratio.map(|c| c * 100.0),
                    })
                    .collect(),
            }
        })
        .collect();

    CategoryOverview {
        metric,
        year: Some(year),
        totals: Some(totals),
        ranking,
        series,
    }
}
