use crate::aggregate::{
    self, CategoryMetric, CategoryOverview, FlowFilter, MetricCards, MonthlyPoint, Seasonality,
    Series, ViewType,
};
use crate::{error::AppError, AppState};
use analytics::{ExecutiveSummary, Insight, InsightsEngine, QuickStats};
use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use database::{DbRepository, StoreTable, YearRange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DASHBOARD_PAGE: &str = include_str!("../assets/dashboard.html");

/// Periods listed in the detail table.
const DETAIL_ROWS: usize = 24;

/// The year-range and flow filters shared by the national endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Filters {
    pub from: Option<i32>,
    pub to: Option<i32>,
    #[serde(default)]
    pub flow: FlowFilter,
    #[serde(default)]
    pub view: ViewType,
}

#[derive(Debug, Deserialize)]
pub struct CategoryFilters {
    pub from: Option<i32>,
    pub to: Option<i32>,
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default)]
    pub metric: CategoryMetric,
}

fn default_top() -> usize {
    10
}

fn year_range(from: Option<i32>, to: Option<i32>) -> Result<YearRange, AppError> {
    match (from, to) {
        (Some(f), Some(t)) if f > t => Err(AppError::BadRequest(format!(
            "'from' ({f}) must not be after 'to' ({t})"
        ))),
        _ => Ok(YearRange::new(from, to)),
    }
}

/// KPI rows when the KPI step has run, the raw pivot otherwise.
async fn load_points(
    repo: &DbRepository,
    range: YearRange,
) -> Result<(Vec<MonthlyPoint>, bool), AppError> {
    if repo.count(StoreTable::KpiMonthly).await? > 0 {
        let rows = repo.kpi(range).await?;
        Ok((rows.into_iter().map(MonthlyPoint::from).collect(), true))
    } else {
        let rows = repo.monthly_pivot(range).await?;
        Ok((rows.into_iter().map(MonthlyPoint::from).collect(), false))
    }
}

/// # GET /
pub async fn index() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

#[derive(Debug, Serialize)]
pub struct Bounds {
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    /// The initial selection covers the last ten years.
    pub default_from: Option<i32>,
    pub has_kpi: bool,
    pub categories: Vec<String>,
}

/// # GET /api/bounds
/// The data available for the filter controls.
pub async fn get_bounds(State(state): State<Arc<AppState>>) -> Result<Json<Bounds>, AppError> {
    let bounds = state.repo.year_bounds().await?;
    let has_kpi = state.repo.count(StoreTable::KpiMonthly).await? > 0;
    let categories = state.repo.categories().await?;
    Ok(Json(Bounds {
        min_year: bounds.map(|(min, _)| min),
        max_year: bounds.map(|(_, max)| max),
        default_from: bounds.map(|(min, max)| min.max(max - 10)),
        has_kpi,
        categories,
    }))
}

#[derive(Debug, Serialize)]
pub struct Metrics {
    pub cards: Option<MetricCards>,
    pub records: usize,
    pub has_kpi: bool,
}

/// # GET /api/metrics
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Filters>,
) -> Result<Json<Metrics>, AppError> {
    let range = year_range(filters.from, filters.to)?;
    let (points, has_kpi) = load_points(&state.repo, range).await?;
    Ok(Json(Metrics {
        cards: aggregate::metric_cards(&points),
        records: points.len(),
        has_kpi,
    }))
}

/// # GET /api/series
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Filters>,
) -> Result<Json<Series>, AppError> {
    let range = year_range(filters.from, filters.to)?;
    let (points, _) = load_points(&state.repo, range).await?;
    Ok(Json(aggregate::series(&points, filters.flow, filters.view)))
}

/// # GET /api/seasonality
pub async fn get_seasonality(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Filters>,
) -> Result<Json<Seasonality>, AppError> {
    let range = year_range(filters.from, filters.to)?;
    let (points, _) = load_points(&state.repo, range).await?;
    Ok(Json(aggregate::seasonality(&points)))
}

/// # GET /api/detail
/// The latest periods of the selection, oldest first.
pub async fn get_detail(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Filters>,
) -> Result<Json<Vec<MonthlyPoint>>, AppError> {
    let range = year_range(filters.from, filters.to)?;
    let (points, _) = load_points(&state.repo, range).await?;
    Ok(Json(aggregate::detail(&points, DETAIL_ROWS).to_vec()))
}

/// # GET /api/categories
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<CategoryFilters>,
) -> Result<Json<CategoryOverview>, AppError> {
    if filters.top == 0 {
        return Err(AppError::BadRequest("'top' must be at least 1".to_string()));
    }
    let range = year_range(filters.from, filters.to)?;
    let rows = state.repo.kpi_prod(range).await?;
    Ok(Json(aggregate::category_overview(&rows, filters.metric, filters.top)))
}

#[derive(Debug, Serialize)]
pub struct Insights {
    pub summary: Option<ExecutiveSummary>,
    pub insights: Vec<Insight>,
    pub quick_stats: Option<QuickStats>,
    /// Markdown rendering of the summary followed by each finding.
    pub markdown: Vec<String>,
}

/// # GET /api/insights
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Filters>,
) -> Result<Json<Insights>, AppError> {
    let range = year_range(filters.from, filters.to)?;
    let categories = state.repo.kpi_prod_records(range).await?;
    let national = state.repo.kpi_records(range).await?;

    let engine = InsightsEngine::default();
    let summary = ExecutiveSummary::build(&national, &categories);
    let mut markdown: Vec<String> = summary.iter().map(ExecutiveSummary::to_markdown).collect();
    markdown.extend(engine.narrate(&categories));

    Ok(Json(Insights {
        summary,
        insights: engine.build(&categories),
        quick_stats: engine.quick_stats(&categories),
        markdown,
    }))
}
