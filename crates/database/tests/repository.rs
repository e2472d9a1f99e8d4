use core_types::{CategoryKpiRecord, Flow, KpiRecord, Month, TradeMonth, TradeRecord};
use database::{connect, connect_url, run_migrations, DbRepository, StoreTable, YearRange};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn repository() -> DbRepository {
    let pool = connect_url("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    DbRepository::new(pool)
}

fn year(year: i32, export: Decimal, import: Decimal) -> Vec<TradeRecord> {
    let mut records = Vec::new();
    for (flow, value) in [(Flow::Export, export), (Flow::Import, import)] {
        for month in Month::ALL {
            records.push(TradeRecord::new(year, TradeMonth::Month(month), flow, value));
        }
        records.push(TradeRecord::new(year, TradeMonth::Total, flow, value * dec!(12)));
    }
    records
}

fn kpi(year: i32, month: Month, export: Decimal) -> KpiRecord {
    KpiRecord {
        year,
        month,
        export_usd: Some(export),
        import_usd: Some(dec!(50)),
        balance: Some(export - dec!(50)),
        export_mom: None,
        export_yoy: None,
        import_mom: None,
        import_yoy: None,
        export_ma3: None,
        import_ma3: None,
        balance_ma3: None,
        export_index: Some(dec!(100)),
        import_index: Some(dec!(100)),
        coverage_ratio: Some(export / dec!(50)),
    }
}

#[tokio::test]
async fn replacing_trade_is_idempotent() {
    let repo = repository().await;
    let mut records = year(2019, dec!(100), dec!(80));
    records.extend(year(2020, dec!(110), dec!(90)));

    repo.replace_trade(&records).await.unwrap();
    let first = repo.trade(YearRange::ALL).await.unwrap();
    repo.replace_trade(&records).await.unwrap();
    let second = repo.trade(YearRange::ALL).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.count(StoreTable::Trade).await.unwrap(), 52);
    assert_eq!(repo.trade_records(YearRange::ALL).await.unwrap().len(), 52);

    // Flows sort by name; the sentinel closes each year.
    assert_eq!(first[0].flow, "export");
    assert_eq!(first[12].month, "Total");
}

#[tokio::test]
async fn pivot_excludes_the_annual_sentinel() {
    let repo = repository().await;
    repo.replace_trade(&year(2021, dec!(100), dec!(120))).await.unwrap();

    let pivot = repo.monthly_pivot(YearRange::ALL).await.unwrap();
    assert_eq!(pivot.len(), 12);
    assert_eq!(pivot[0].month_num, 1);
    assert_eq!(pivot[0].export_usd, Some(100.0));
    assert_eq!(pivot[0].import_usd, Some(120.0));
    assert_eq!(pivot[11].month, "Diciembre");
}

#[tokio::test]
async fn windowed_view_follows_lag_semantics() {
    let repo = repository().await;
    let mut records = year(2018, dec!(100), dec!(50));
    records.extend(year(2019, dec!(121), dec!(50)));
    repo.replace_trade(&records).await.unwrap();

    let rows = repo.monthly_windowed(YearRange::ALL).await.unwrap();
    assert_eq!(rows.len(), 24);
    assert_eq!(rows[0].export_prev_month, None);
    assert_eq!(rows[1].export_prev_month, Some(100.0));
    assert_eq!(rows[1].export_ma3, None);
    assert_eq!(rows[2].export_ma3, Some(100.0));
    assert_eq!(rows[11].export_prev_year, None);
    assert_eq!(rows[12].export_prev_year, Some(100.0));
    assert_eq!(rows[12].coverage_ratio, Some(121.0 / 50.0));

    // Filtering happens after the windows are computed.
    let only_2019 = repo.monthly_windowed(YearRange::new(Some(2019), None)).await.unwrap();
    assert_eq!(only_2019.len(), 12);
    assert_eq!(only_2019[0].export_prev_month, Some(100.0));
}

#[tokio::test]
async fn roll_ups_by_quarter_and_year() {
    let repo = repository().await;
    let mut records = year(2022, dec!(10), dec!(4));
    records.extend(year(2023, dec!(20), dec!(4)));
    repo.replace_trade(&records).await.unwrap();

    let quarters = repo.quarterly(YearRange::new(Some(2023), Some(2023))).await.unwrap();
    assert_eq!(quarters.len(), 4);
    assert_eq!(quarters[0].export_usd, Some(60.0));
    assert_eq!(quarters[0].months_reported, 3);

    let annual = repo.annual(YearRange::ALL).await.unwrap();
    assert_eq!(annual.len(), 2);
    assert_eq!(annual[0].balance, Some(72.0));
    assert_eq!(repo.year_bounds().await.unwrap(), Some((2022, 2023)));
}

#[tokio::test]
async fn kpi_rows_round_trip_through_the_store() {
    let repo = repository().await;
    let records = vec![kpi(2020, Month::January, dec!(100)), kpi(2020, Month::February, dec!(110))];
    repo.replace_kpi(&records).await.unwrap();

    let rows = repo.kpi(YearRange::ALL).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].period_label(), "2020-02");
    assert_eq!(rows[1].balance, Some(60.0));
    assert_eq!(rows[1].export_mom, None);

    let back = repo.kpi_records(YearRange::ALL).await.unwrap();
    assert_eq!(back, records);
}

#[tokio::test]
async fn category_tables_are_replaced_and_filtered() {
    let repo = repository().await;
    let records = vec![
        CategoryKpiRecord { category: "Oro".to_string(), kpi: kpi(2019, Month::May, dec!(5)) },
        CategoryKpiRecord { category: "Cobre".to_string(), kpi: kpi(2020, Month::May, dec!(7)) },
    ];
    repo.replace_kpi_prod(&records).await.unwrap();

    assert_eq!(repo.categories().await.unwrap(), vec!["Cobre", "Oro"]);
    let recent = repo.kpi_prod(YearRange::new(Some(2020), None)).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].category, "Cobre");
    assert_eq!(recent[0].kpi.export_usd, Some(7.0));
}

#[tokio::test]
async fn empty_store_has_no_bounds() {
    let repo = repository().await;
    assert_eq!(repo.year_bounds().await.unwrap(), None);
    assert!(repo.kpi(YearRange::ALL).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_is_created_on_first_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("trade.db");
    let pool = connect(&path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    assert!(path.exists());
}
