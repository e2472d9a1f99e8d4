use crate::DbError;
use core_types::{
    CategoryKpiRecord, CategoryTradeRecord, Flow, KpiRecord, Month, TradeMonth, TradeRecord,
};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::{FromRow, Transaction};

/// Inclusive year bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: Option<i32>,
    pub to: Option<i32>,
}

impl YearRange {
    pub const ALL: YearRange = YearRange { from: None, to: None };

    pub fn new(from: Option<i32>, to: Option<i32>) -> Self {
        Self { from, to }
    }
}

/// Tables owned by the store, named as they are in SQLite and on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTable {
    Trade,
    KpiMonthly,
    TradeProd,
    KpiProdMonthly,
}

impl StoreTable {
    pub fn name(&self) -> &'static str {
        match self {
            StoreTable::Trade => "trade",
            StoreTable::KpiMonthly => "kpi_monthly",
            StoreTable::TradeProd => "trade_prod",
            StoreTable::KpiProdMonthly => "kpi_prod_monthly",
        }
    }
}

/// A row of the `trade` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TradeRow {
    pub year: i32,
    pub month: String,
    pub flow: String,
    pub usd: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CategoryTradeRow {
    pub year: i32,
    pub month: String,
    pub flow: String,
    pub category: String,
    pub usd: f64,
}

/// A row of `kpi_monthly`, as read by the report and the dashboard.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct KpiRow {
    pub year: i32,
    pub month: String,
    pub month_num: i32,
    pub export_usd: Option<f64>,
    pub import_usd: Option<f64>,
    pub balance: Option<f64>,
    pub export_mom: Option<f64>,
    pub export_yoy: Option<f64>,
    pub import_mom: Option<f64>,
    pub import_yoy: Option<f64>,
    pub export_ma3: Option<f64>,
    pub import_ma3: Option<f64>,
    pub balance_ma3: Option<f64>,
    pub export_index: Option<f64>,
    pub import_index: Option<f64>,
    pub coverage_ratio: Option<f64>,
}

impl KpiRow {
    /// `YYYY-MM`
    pub fn period_label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month_num)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CategoryKpiRow {
    pub category: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub kpi: KpiRow,
}

/// A row of `v_monthly_pivot`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PivotRow {
    pub year: i32,
    pub month: String,
    pub month_num: i32,
    pub export_usd: Option<f64>,
    pub import_usd: Option<f64>,
}

/// A row of `v_monthly_windowed`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WindowedRow {
    pub year: i32,
    pub month: String,
    pub month_num: i32,
    pub export_usd: Option<f64>,
    pub import_usd: Option<f64>,
    pub balance: Option<f64>,
    pub export_prev_month: Option<f64>,
    pub export_prev_year: Option<f64>,
    pub import_prev_month: Option<f64>,
    pub import_prev_year: Option<f64>,
    pub export_ma3: Option<f64>,
    pub import_ma3: Option<f64>,
    pub coverage_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuarterRow {
    pub year: i32,
    pub quarter: i32,
    pub export_usd: Option<f64>,
    pub import_usd: Option<f64>,
    pub balance: Option<f64>,
    pub months_reported: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AnnualRow {
    pub year: i32,
    pub export_usd: Option<f64>,
    pub import_usd: Option<f64>,
    pub balance: Option<f64>,
    pub months_reported: i64,
}

fn real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn opt_real(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|v| v.to_f64())
}

fn exact(value: f64, what: &str) -> Result<Decimal, DbError> {
    Decimal::from_f64(value).ok_or_else(|| DbError::InvalidRow(format!("{what}: {value}")))
}

fn opt_exact(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

impl TradeRow {
    pub fn into_record(self) -> Result<TradeRecord, DbError> {
        let month = TradeMonth::from_str(&self.month)
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        let flow = Flow::from_str(&self.flow).map_err(|e| DbError::InvalidRow(e.to_string()))?;
        Ok(TradeRecord::new(self.year, month, flow, exact(self.usd, "usd")?))
    }
}

impl CategoryTradeRow {
    pub fn into_record(self) -> Result<CategoryTradeRecord, DbError> {
        let month = TradeMonth::from_str(&self.month)
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        let flow = Flow::from_str(&self.flow).map_err(|e| DbError::InvalidRow(e.to_string()))?;
        Ok(CategoryTradeRecord {
            year: self.year,
            month,
            flow,
            category: self.category,
            usd: exact(self.usd, "usd")?,
        })
    }
}

impl KpiRow {
    pub fn into_record(self) -> Result<KpiRecord, DbError> {
        let month = u32::try_from(self.month_num)
            .ok()
            .and_then(Month::from_number)
            .ok_or_else(|| DbError::InvalidRow(format!("month_num: {}", self.month_num)))?;
        Ok(KpiRecord {
            year: self.year,
            month,
            export_usd: opt_exact(self.export_usd),
            import_usd: opt_exact(self.import_usd),
            balance: opt_exact(self.balance),
            export_mom: opt_exact(self.export_mom),
            export_yoy: opt_exact(self.export_yoy),
            import_mom: opt_exact(self.import_mom),
            import_yoy: opt_exact(self.import_yoy),
            export_ma3: opt_exact(self.export_ma3),
            import_ma3: opt_exact(self.import_ma3),
            balance_ma3: opt_exact(self.balance_ma3),
            export_index: opt_exact(self.export_index),
            import_index: opt_exact(self.import_index),
            coverage_ratio: opt_exact(self.coverage_ratio),
        })
    }
}

impl CategoryKpiRow {
    pub fn into_record(self) -> Result<CategoryKpiRecord, DbError> {
        Ok(CategoryKpiRecord {
            category: self.category,
            kpi: self.kpi.into_record()?,
        })
    }
}

const KPI_COLUMNS: &str = "year, month, month_num, export_usd, import_usd, balance, \
    export_mom, export_yoy, import_mom, import_yoy, export_ma3, import_ma3, balance_ma3, \
    export_index, import_index, coverage_ratio";

const YEAR_FILTER: &str = "(? IS NULL OR year >= ?) AND (? IS NULL OR year <= ?)";

/// The `DbRepository` provides a high-level, application-specific interface
/// to the store. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: SqlitePool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of rows currently stored in `table`.
    pub async fn count(&self, table: StoreTable) -> Result<i64, DbError> {
        let query = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Replaces the whole `trade` table within a single transaction, so a
    /// failed run leaves the previous contents in place.
    pub async fn replace_trade(&self, records: &[TradeRecord]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM trade").execute(&mut *tx).await?;

        for record in records {
            sqlx::query("INSERT INTO trade (year, month, flow, usd) VALUES (?, ?, ?, ?)")
                .bind(record.year)
                .bind(record.month.label())
                .bind(record.flow.as_str())
                .bind(real(record.usd))
                .execute(&mut *tx) // Note: must use the transaction object `tx` here
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(rows = records.len(), "Replaced table trade.");
        Ok(records.len() as u64)
    }

    /// Fetches `trade` rows (annual sentinels included) in stored order.
    pub async fn trade(&self, range: YearRange) -> Result<Vec<TradeRow>, DbError> {
        let query = format!(
            "SELECT t.year, t.month, t.flow, t.usd FROM trade AS t \
             LEFT JOIN month_names AS m ON m.month = t.month \
             WHERE {YEAR_FILTER} \
             ORDER BY t.year, t.flow, COALESCE(m.month_num, 13)"
        );
        let rows = bind_range(sqlx::query_as::<_, TradeRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn trade_records(&self, range: YearRange) -> Result<Vec<TradeRecord>, DbError> {
        self.trade(range)
            .await?
            .into_iter()
            .map(TradeRow::into_record)
            .collect()
    }

    pub async fn replace_kpi(&self, records: &[KpiRecord]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kpi_monthly").execute(&mut *tx).await?;
        let insert = format!(
            "INSERT INTO kpi_monthly ({KPI_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        for record in records {
            insert_kpi(&mut tx, &insert, None, record).await?;
        }
        tx.commit().await?;
        tracing::debug!(rows = records.len(), "Replaced table kpi_monthly.");
        Ok(records.len() as u64)
    }

    /// Fetches `kpi_monthly` ordered by period.
    pub async fn kpi(&self, range: YearRange) -> Result<Vec<KpiRow>, DbError> {
        let query = format!(
            "SELECT {KPI_COLUMNS} FROM kpi_monthly WHERE {YEAR_FILTER} ORDER BY year, month_num"
        );
        let rows = bind_range(sqlx::query_as::<_, KpiRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn kpi_records(&self, range: YearRange) -> Result<Vec<KpiRecord>, DbError> {
        self.kpi(range)
            .await?
            .into_iter()
            .map(KpiRow::into_record)
            .collect()
    }

    pub async fn replace_trade_prod(&self, records: &[CategoryTradeRecord]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM trade_prod").execute(&mut *tx).await?;
        for record in records {
            sqlx::query(
                "INSERT INTO trade_prod (year, month, flow, category, usd) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.year)
            .bind(record.month.label())
            .bind(record.flow.as_str())
            .bind(&record.category)
            .bind(real(record.usd))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::debug!(rows = records.len(), "Replaced table trade_prod.");
        Ok(records.len() as u64)
    }

    pub async fn trade_prod(&self, range: YearRange) -> Result<Vec<CategoryTradeRow>, DbError> {
        let query = format!(
            "SELECT t.year, t.month, t.flow, t.category, t.usd FROM trade_prod AS t \
             LEFT JOIN month_names AS m ON m.month = t.month \
             WHERE {YEAR_FILTER} \
             ORDER BY t.year, t.flow, t.category, COALESCE(m.month_num, 13)"
        );
        let rows = bind_range(sqlx::query_as::<_, CategoryTradeRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn trade_prod_records(
        &self,
        range: YearRange,
    ) -> Result<Vec<CategoryTradeRecord>, DbError> {
        self.trade_prod(range)
            .await?
            .into_iter()
            .map(CategoryTradeRow::into_record)
            .collect()
    }

    pub async fn replace_kpi_prod(&self, records: &[CategoryKpiRecord]) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kpi_prod_monthly").execute(&mut *tx).await?;
        let insert = format!(
            "INSERT INTO kpi_prod_monthly (category, {KPI_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        for record in records {
            insert_kpi(&mut tx, &insert, Some(&record.category), &record.kpi).await?;
        }
        tx.commit().await?;
        tracing::debug!(rows = records.len(), "Replaced table kpi_prod_monthly.");
        Ok(records.len() as u64)
    }

    pub async fn kpi_prod(&self, range: YearRange) -> Result<Vec<CategoryKpiRow>, DbError> {
        let query = format!(
            "SELECT category, {KPI_COLUMNS} FROM kpi_prod_monthly \
             WHERE {YEAR_FILTER} ORDER BY category, year, month_num"
        );
        let rows = bind_range(sqlx::query_as::<_, CategoryKpiRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn kpi_prod_records(
        &self,
        range: YearRange,
    ) -> Result<Vec<CategoryKpiRecord>, DbError> {
        self.kpi_prod(range)
            .await?
            .into_iter()
            .map(CategoryKpiRow::into_record)
            .collect()
    }

    pub async fn monthly_pivot(&self, range: YearRange) -> Result<Vec<PivotRow>, DbError> {
        let query = format!(
            "SELECT year, month, month_num, export_usd, import_usd FROM v_monthly_pivot \
             WHERE {YEAR_FILTER} ORDER BY year, month_num"
        );
        let rows = bind_range(sqlx::query_as::<_, PivotRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Windowed view. Lags are computed over the whole history before the
    /// range is applied, so the first rows of a range still see their predecessors.
    pub async fn monthly_windowed(&self, range: YearRange) -> Result<Vec<WindowedRow>, DbError> {
        let query = format!(
            "SELECT year, month, month_num, export_usd, import_usd, balance, \
             export_prev_month, export_prev_year, import_prev_month, import_prev_year, \
             export_ma3, import_ma3, coverage_ratio FROM v_monthly_windowed \
             WHERE {YEAR_FILTER} ORDER BY year, month_num"
        );
        let rows = bind_range(sqlx::query_as::<_, WindowedRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn quarterly(&self, range: YearRange) -> Result<Vec<QuarterRow>, DbError> {
        let query = format!(
            "SELECT year, quarter, export_usd, import_usd, balance, months_reported \
             FROM v_quarterly WHERE {YEAR_FILTER} ORDER BY year, quarter"
        );
        let rows = bind_range(sqlx::query_as::<_, QuarterRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn annual(&self, range: YearRange) -> Result<Vec<AnnualRow>, DbError> {
        let query = format!(
            "SELECT year, export_usd, import_usd, balance, months_reported \
             FROM v_annual WHERE {YEAR_FILTER} ORDER BY year"
        );
        let rows = bind_range(sqlx::query_as::<_, AnnualRow>(&query), range)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// First and last year with monthly data, if any.
    pub async fn year_bounds(&self) -> Result<Option<(i32, i32)>, DbError> {
        let bounds: (Option<i32>, Option<i32>) =
            sqlx::query_as("SELECT MIN(year), MAX(year) FROM v_monthly_pivot")
                .fetch_one(&self.pool)
                .await?;
        Ok(bounds.0.zip(bounds.1))
    }

    /// Distinct categories in `kpi_prod_monthly`.
    pub async fn categories(&self) -> Result<Vec<String>, DbError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT category FROM kpi_prod_monthly ORDER BY category")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

type QueryAs<'q, T> = sqlx::query::QueryAs<'q, Sqlite, T, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_range<'q, T>(query: QueryAs<'q, T>, range: YearRange) -> QueryAs<'q, T> {
    query
        .bind(range.from)
        .bind(range.from)
        .bind(range.to)
        .bind(range.to)
}

async fn insert_kpi(
    tx: &mut Transaction<'_, Sqlite>,
    insert: &str,
    category: Option<&str>,
    record: &KpiRecord,
) -> Result<(), DbError> {
    let mut query = sqlx::query(insert);
    if let Some(category) = category {
        query = query.bind(category);
    }
    query
        .bind(record.year)
        .bind(record.month.label())
        .bind(record.month_num() as i32)
        .bind(opt_real(record.export_usd))
        .bind(opt_real(record.import_usd))
        .bind(opt_real(record.balance))
        .bind(opt_real(record.export_mom))
        .bind(opt_real(record.export_yoy))
        .bind(opt_real(record.import_mom))
        .bind(opt_real(record.import_yoy))
        .bind(opt_real(record.export_ma3))
        .bind(opt_real(record.import_ma3))
        .bind(opt_real(record.balance_ma3))
        .bind(opt_real(record.export_index))
        .bind(opt_real(record.import_index))
        .bind(opt_real(record.coverage_ratio))
        .execute(&mut **tx)
        .await?;
    Ok(())
}
