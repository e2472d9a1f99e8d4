//! Columnar Parquet copies of the stored tables, written next to the database
//! so the data can be consumed without SQLite.

use crate::error::DbError;
use crate::repository::StoreTable;
use core_types::{CategoryKpiRecord, CategoryTradeRecord, KpiRecord, TradeRecord};
use polars::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fs::File;
use std::path::{Path, PathBuf};

fn real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn opt_real(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|v| v.to_f64())
}

/// Full path of a table's snapshot inside `dir`.
pub fn snapshot_path(dir: &Path, table: StoreTable) -> PathBuf {
    dir.join(format!("{}.parquet", table.name()))
}

fn write(dir: &Path, table: StoreTable, columns: Vec<Series>) -> Result<PathBuf, DbError> {
    let path = snapshot_path(dir, table);
    let snapshot_err = |source| DbError::Snapshot {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(|source| DbError::StoreLocation {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut df = DataFrame::new(columns).map_err(snapshot_err)?;
    let file = File::create(&path).map_err(|e| snapshot_err(PolarsError::from(e)))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(&mut df)
        .map_err(snapshot_err)?;

    tracing::debug!(path = %path.display(), rows = df.height(), "Wrote snapshot.");
    Ok(path)
}

/// Writes `trade.parquet`, rows in the order given.
pub fn write_trade(dir: &Path, records: &[TradeRecord]) -> Result<PathBuf, DbError> {
    let columns = vec![
        Series::new("year", records.iter().map(|r| r.year).collect::<Vec<_>>()),
        Series::new("month", records.iter().map(|r| r.month.label()).collect::<Vec<_>>()),
        Series::new("flow", records.iter().map(|r| r.flow.as_str()).collect::<Vec<_>>()),
        Series::new("usd", records.iter().map(|r| real(r.usd)).collect::<Vec<_>>()),
    ];
    write(dir, StoreTable::Trade, columns)
}

pub fn write_trade_prod(dir: &Path, records: &[CategoryTradeRecord]) -> Result<PathBuf, DbError> {
    let columns = vec![
        Series::new("year", records.iter().map(|r| r.year).collect::<Vec<_>>()),
        Series::new("month", records.iter().map(|r| r.month.label()).collect::<Vec<_>>()),
        Series::new("flow", records.iter().map(|r| r.flow.as_str()).collect::<Vec<_>>()),
        Series::new(
            "category",
            records.iter().map(|r| r.category.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("usd", records.iter().map(|r| real(r.usd)).collect::<Vec<_>>()),
    ];
    write(dir, StoreTable::TradeProd, columns)
}

fn kpi_columns<'a>(records: impl Iterator<Item = &'a KpiRecord> + Clone) -> Vec<Series> {
    let metric = |name: &str, get: fn(&KpiRecord) -> Option<Decimal>| {
        Series::new(
            name,
            records.clone().map(|r| opt_real(get(r))).collect::<Vec<_>>(),
        )
    };
    vec![
        Series::new("year", records.clone().map(|r| r.year).collect::<Vec<_>>()),
        Series::new("month", records.clone().map(|r| r.month.label()).collect::<Vec<_>>()),
        Series::new(
            "month_num",
            records.clone().map(|r| r.month_num() as i32).collect::<Vec<_>>(),
        ),
        metric("export_usd", |r| r.export_usd),
        metric("import_usd", |r| r.import_usd),
        metric("balance", |r| r.balance),
        metric("export_mom", |r| r.export_mom),
        metric("export_yoy", |r| r.export_yoy),
        metric("import_mom", |r| r.import_mom),
        metric("import_yoy", |r| r.import_yoy),
        metric("export_ma3", |r| r.export_ma3),
        metric("import_ma3", |r| r.import_ma3),
        metric("balance_ma3", |r| r.balance_ma3),
        metric("export_index", |r| r.export_index),
        metric("import_index", |r| r.import_index),
        metric("coverage_ratio", |r| r.coverage_ratio),
    ]
}

pub fn write_kpi(dir: &Path, records: &[KpiRecord]) -> Result<PathBuf, DbError> {
    write(dir, StoreTable::KpiMonthly, kpi_columns(records.iter()))
}

pub fn write_kpi_prod(dir: &Path, records: &[CategoryKpiRecord]) -> Result<PathBuf, DbError> {
    let mut columns = vec![Series::new(
        "category",
        records.iter().map(|r| r.category.as_str()).collect::<Vec<_>>(),
    )];
    columns.extend(kpi_columns(records.iter().map(|r| &r.kpi)));
    write(dir, StoreTable::KpiProdMonthly, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Flow, Month, TradeMonth};
    use rust_decimal_macros::dec;

    fn read(path: &Path) -> DataFrame {
        ParquetReader::new(File::open(path).unwrap()).finish().unwrap()
    }

    #[test]
    fn trade_snapshot_keeps_rows_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            TradeRecord::new(2020, TradeMonth::Month(Month::January), Flow::Export, dec!(10.5)),
            TradeRecord::new(2020, TradeMonth::Total, Flow::Export, dec!(10.5)),
        ];
        let path = write_trade(dir.path(), &records).unwrap();
        assert_eq!(path.file_name().unwrap(), "trade.parquet");

        let df = read(&path);
        assert_eq!(df.shape(), (2, 4));
        let months: Vec<_> = df.column("month").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(months, vec!["Enero", "Total"]);
        let usd = df.column("usd").unwrap().f64().unwrap().get(0);
        assert_eq!(usd, Some(10.5));
    }

    #[test]
    fn kpi_snapshot_writes_nulls_for_undefined_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let record = KpiRecord {
            year: 2021,
            month: Month::March,
            export_usd: Some(dec!(100)),
            import_usd: Some(dec!(120)),
            balance: Some(dec!(-20)),
            export_mom: None,
            export_yoy: None,
            import_mom: None,
            import_yoy: None,
            export_ma3: None,
            import_ma3: None,
            balance_ma3: None,
            export_index: Some(dec!(100)),
            import_index: Some(dec!(100)),
            coverage_ratio: None,
        };
        let path = write_kpi_prod(
            dir.path(),
            &[CategoryKpiRecord {
                category: "Cobre".to_string(),
                kpi: record,
            }],
        )
        .unwrap();

        let df = read(&path);
        assert_eq!(df.width(), 17);
        assert_eq!(df.column("export_mom").unwrap().null_count(), 1);
        assert_eq!(df.column("balance").unwrap().f64().unwrap().get(0), Some(-20.0));
        assert_eq!(df.column("month_num").unwrap().i32().unwrap().get(0), Some(3));
    }
}
