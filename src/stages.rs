//! The pipeline stages behind each subcommand. Every stage reads its inputs
//! from the workbooks or the store, writes its outputs wholesale and prints a
//! short console summary.

use analytics::{
    observations_from_kpi, observations_from_pivot, pivot_national, EdaAnalyzer, ExecutiveSummary,
    InsightsEngine, KpiCalculator,
};
use anyhow::{bail, Context};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::Config;
use core_types::{CategoryTradeRecord, Flow, KpiRecord};
use database::{snapshot, DbRepository, YearRange};
use indicatif::{ProgressBar, ProgressStyle};
use ingest::{
    count_year_sheets, extract_categories, extract_national, CategoryTableBuilder,
    LongFormatBuilder, ParseError, QaReconciler, QaReport,
};
use std::path::{Path, PathBuf};

/// Number of periods echoed after the KPI step.
const LATEST_PERIODS: usize = 3;

fn sheet_progress(path: &Path, flow: Flow) -> anyhow::Result<ProgressBar> {
    let sheets = count_year_sheets(path)
        .with_context(|| format!("Failed to open the {flow} workbook {}", path.display()))?;
    let progress_bar = ProgressBar::new(sheets as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message(format!("{flow} sheets"));
    Ok(progress_bar)
}

fn qa_reconciler(config: &Config) -> QaReconciler {
    QaReconciler::new(config.qa.relative_tolerance, config.qa.absolute_tolerance)
}

fn print_qa(report: &QaReport) {
    println!("\nQA reconciliation (monthly sum vs. annual total)");
    // Category reports have one line per category and year; show failures only.
    let only_failures = report.entries.iter().any(|e| e.category.is_some());
    if only_failures && report.is_clean() {
        println!("All {} category totals reconcile.", report.entries.len());
    } else {
        println!("{}", report.to_table(only_failures));
    }
}

fn print_skipped(skipped: &[ParseError]) {
    if skipped.is_empty() {
        return;
    }
    println!("\nSkipped sheets:");
    for error in skipped {
        println!("  - {error}");
    }
}

fn summary_table(rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Item", "Value"]);
    for (item, value) in rows {
        table.add_row(vec![item.to_string(), value.clone()]);
    }
    table
}

// ==============================================================================
// National ETL
// ==============================================================================

/// Parses both national workbooks, reconciles them and replaces `trade`.
pub async fn run_etl(config: &Config, repo: &DbRepository) -> anyhow::Result<()> {
    let mut builder = LongFormatBuilder::new();
    let mut skipped = Vec::new();
    let mut parsed_sheets = 0;

    for (flow, path) in [
        (Flow::Import, &config.sources.imports),
        (Flow::Export, &config.sources.exports),
    ] {
        let progress_bar = sheet_progress(path, flow)?;
        let extraction = extract_national(path, flow, |_| progress_bar.inc(1))
            .with_context(|| format!("Failed to read the {flow} workbook"))?;
        progress_bar.finish_and_clear();

        parsed_sheets += extraction.parsed.len();
        for sheet in &extraction.parsed {
            builder.push_sheet(sheet);
        }
        skipped.extend(extraction.skipped);
    }

    if parsed_sheets == 0 {
        print_skipped(&skipped);
        bail!("No worksheet could be parsed from the input workbooks");
    }

    let table = builder.build();
    for (year, flow) in table.unpaired_years() {
        tracing::warn!(year, %flow, missing = %flow.opposite(), "Year present in only one workbook.");
    }

    let qa = qa_reconciler(config).reconcile(&table.records);
    print_qa(&qa);

    let written = repo
        .replace_trade(&table.records)
        .await
        .context("Failed to write the trade table")?;
    let snapshot = snapshot::write_trade(&config.store.snapshot_dir, &table.records)
        .context("Failed to write the trade snapshot")?;

    print_skipped(&skipped);
    let years = table.years();
    let span = match (years.first(), years.last()) {
        (Some(first), Some(last)) => format!("{first}-{last}"),
        _ => "-".to_string(),
    };
    println!(
        "\n{}",
        summary_table(&[
            ("Sheets parsed", parsed_sheets.to_string()),
            ("Sheets skipped", skipped.len().to_string()),
            ("Years", span),
            ("Monthly records", table.monthly().count().to_string()),
            ("Rows written to trade", written.to_string()),
            ("Duplicate keys overwritten", table.duplicates.to_string()),
            ("QA mismatches", qa.mismatches().count().to_string()),
            ("Snapshot", snapshot.display().to_string()),
        ])
    );
    tracing::info!(rows = written, "ETL complete.");
    Ok(())
}

// ==============================================================================
// National KPI
// ==============================================================================

fn latest_table(records: &[KpiRecord]) -> Table {
    let fmt = |v: Option<rust_decimal::Decimal>| {
        v.map(|d| d.round_dp(2).to_string()).unwrap_or_else(|| "-".to_string())
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Period", "Exports", "Imports", "Balance", "Exp MoM %", "Exp YoY %", "Exp MA3", "Coverage",
    ]);
    for record in &records[records.len().saturating_sub(LATEST_PERIODS)..] {
        table.add_row(vec![
            record.period().label(),
            fmt(record.export_usd),
            fmt(record.import_usd),
            fmt(record.balance),
            fmt(record.export_mom),
            fmt(record.export_yoy),
            fmt(record.export_ma3),
            fmt(record.coverage_ratio),
        ]);
    }
    table
}

/// Recomputes `kpi_monthly` from the stored `trade` table.
pub async fn run_kpi(config: &Config, repo: &DbRepository) -> anyhow::Result<()> {
    let trade = repo
        .trade_records(YearRange::ALL)
        .await
        .context("Failed to read the trade table")?;
    if trade.is_empty() {
        bail!("The trade table is empty; run the etl command first");
    }

    let calculator = KpiCalculator::new(config.kpi.moving_average_window, config.kpi.yoy_lag);
    let records = calculator.calculate(&pivot_national(&trade));

    let written = repo
        .replace_kpi(&records)
        .await
        .context("Failed to write the kpi_monthly table")?;
    let snapshot = snapshot::write_kpi(&config.store.snapshot_dir, &records)
        .context("Failed to write the KPI snapshot")?;

    println!("\nLatest periods");
    println!("{}", latest_table(&records));
    println!("{written} KPI rows written; snapshot at {}", snapshot.display());
    tracing::info!(rows = written, "KPI step complete.");
    Ok(())
}

// ==============================================================================
// EDA
// ==============================================================================

/// Computes the exploratory statistics and writes the report artifacts.
pub async fn run_eda(config: &Config, repo: &DbRepository) -> anyhow::Result<Vec<PathBuf>> {
    let kpi = repo
        .kpi_records(YearRange::ALL)
        .await
        .context("Failed to read the kpi_monthly table")?;
    let observations = if kpi.is_empty() {
        tracing::warn!("kpi_monthly is empty; analysing the raw trade pivot instead.");
        let trade = repo
            .trade_records(YearRange::ALL)
            .await
            .context("Failed to read the trade table")?;
        observations_from_pivot(&pivot_national(&trade))
    } else {
        observations_from_kpi(&kpi)
    };

    let analyzer = EdaAnalyzer::new(config.eda.outlier_sigma, config.eda.outlier_window);
    let report = analyzer
        .analyze(&observations)
        .context("Exploratory analysis failed; run the etl command first")?;
    let written = reporter::write_reports(&config.eda.reports_dir, &report)
        .context("Failed to write the EDA reports")?;

    println!(
        "\n{}",
        summary_table(&[
            ("Months analysed", report.total_months.to_string()),
            ("Mean exports (US$)", analytics::format_currency(report.export_mean)),
            (
                "Max exports (US$)",
                format!(
                    "{} in {}",
                    analytics::format_currency(report.export_max),
                    report.export_max_period.label()
                ),
            ),
            (
                "Surplus months",
                format!("{} ({:.1}%)", report.surplus_months, report.surplus_share()),
            ),
            ("Peak / trough month", format!("{} / {}", report.peak_month, report.trough_month)),
            ("Outliers", report.outliers.len().to_string()),
            ("Reports", config.eda.reports_dir.display().to_string()),
        ])
    );
    Ok(written)
}

// ==============================================================================
// Category ETL and KPI
// ==============================================================================

/// Parses the per-category workbooks and replaces `trade_prod`.
pub async fn run_etl_products(config: &Config, repo: &DbRepository) -> anyhow::Result<()> {
    let Some(products) = &config.sources.products else {
        bail!("No category workbooks configured; set [sources.products] in the config file");
    };

    let mut builder = CategoryTableBuilder::new();
    let mut skipped = Vec::new();
    let mut parsed_sheets = 0;
    for (flow, path) in [(Flow::Import, &products.imports), (Flow::Export, &products.exports)] {
        let progress_bar = sheet_progress(path, flow)?;
        let extraction = extract_categories(path, flow, |_| progress_bar.inc(1))
            .with_context(|| format!("Failed to read the {flow} category workbook"))?;
        progress_bar.finish_and_clear();

        parsed_sheets += extraction.parsed.len();
        builder.extend(extraction.parsed.into_iter().flatten());
        skipped.extend(extraction.skipped);
    }

    if parsed_sheets == 0 {
        print_skipped(&skipped);
        bail!("No worksheet could be parsed from the category workbooks");
    }

    let (records, duplicates): (Vec<CategoryTradeRecord>, usize) = builder.build();
    let qa = qa_reconciler(config).reconcile_categories(&records);
    print_qa(&qa);

    let written = repo
        .replace_trade_prod(&records)
        .await
        .context("Failed to write the trade_prod table")?;
    let snapshot = snapshot::write_trade_prod(&config.store.snapshot_dir, &records)
        .context("Failed to write the trade_prod snapshot")?;

    print_skipped(&skipped);
    let categories = records
        .iter()
        .map(|r| r.category.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    println!(
        "\n{}",
        summary_table(&[
            ("Sheets parsed", parsed_sheets.to_string()),
            ("Sheets skipped", skipped.len().to_string()),
            ("Categories", categories.to_string()),
            ("Rows written to trade_prod", written.to_string()),
            ("Duplicate keys overwritten", duplicates.to_string()),
            ("QA mismatches", qa.mismatches().count().to_string()),
            ("Snapshot", snapshot.display().to_string()),
        ])
    );
    Ok(())
}

/// Recomputes `kpi_prod_monthly` and prints the resulting findings.
pub async fn run_kpi_products(config: &Config, repo: &DbRepository) -> anyhow::Result<()> {
    let trade = repo
        .trade_prod_records(YearRange::ALL)
        .await
        .context("Failed to read the trade_prod table")?;
    if trade.is_empty() {
        bail!("The trade_prod table is empty; run the etl-products command first");
    }

    let calculator = KpiCalculator::new(config.kpi.moving_average_window, config.kpi.yoy_lag);
    let records = calculator.calculate_categories(&trade);
    let written = repo
        .replace_kpi_prod(&records)
        .await
        .context("Failed to write the kpi_prod_monthly table")?;
    let snapshot = snapshot::write_kpi_prod(&config.store.snapshot_dir, &records)
        .context("Failed to write the kpi_prod_monthly snapshot")?;
    println!("{written} category KPI rows written; snapshot at {}", snapshot.display());

    let national = repo.kpi_records(YearRange::ALL).await?;
    if let Some(summary) = ExecutiveSummary::build(&national, &records) {
        println!("\n{}", summary.to_markdown());
    }
    for finding in InsightsEngine::default().narrate(&records) {
        println!("\n{finding}");
    }
    Ok(())
}

// ==============================================================================
// Artifacts
// ==============================================================================

/// `1.2 MB`-style sizes for the artifact listing.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// The store, its snapshots and the report files, with their sizes.
/// Files that do not exist are left out.
pub fn artifacts(config: &Config, reports: &[PathBuf]) -> Vec<(PathBuf, u64)> {
    let mut paths = vec![config.store.database.clone()];
    for table in [database::StoreTable::Trade, database::StoreTable::KpiMonthly] {
        paths.push(snapshot::snapshot_path(&config.store.snapshot_dir, table));
    }
    paths.extend(reports.iter().cloned());

    paths
        .into_iter()
        .filter_map(|path| {
            let size = std::fs::metadata(&path).ok()?.len();
            Some((path, size))
        })
        .collect()
}
