use crate::error::ReportError;
use analytics::{format_currency, EdaReport};
use chrono::{DateTime, Local};
use std::fmt::{self, Write};

/// Renders the narrative `eda_summary.md` document.
pub fn render_summary(report: &EdaReport, generated_at: DateTime<Local>) -> Result<String, ReportError> {
    let mut out = String::new();
    write_summary(&mut out, report, generated_at)?;
    Ok(out)
}

fn write_summary(out: &mut String, report: &EdaReport, generated_at: DateTime<Local>) -> fmt::Result {
    let range = match (report.first_period(), report.last_period()) {
        (Some(first), Some(last)) => format!("{} to {}", first.label(), last.label()),
        _ => "no data".to_string(),
    };

    writeln!(out, "# Exploratory analysis of Peruvian foreign trade\n")?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M"))?;
    writeln!(out, "Period analysed: {range} ({} months)\n", report.total_months)?;

    writeln!(out, "## 1. Exports\n")?;
    writeln!(out, "- Mean monthly exports: US$ {}", format_currency(report.export_mean))?;
    match report.export_std {
        Some(std) => writeln!(out, "- Standard deviation: US$ {}", format_currency(std))?,
        None => writeln!(out, "- Standard deviation: undefined (a single month)")?,
    }
    writeln!(
        out,
        "- Maximum: US$ {} in {}\n",
        format_currency(report.export_max),
        report.export_max_period.label()
    )?;

    writeln!(out, "## 2. Trade balance\n")?;
    writeln!(
        out,
        "- Surplus months: {} of {} ({:.1}%)\n",
        report.surplus_months,
        report.total_months,
        report.surplus_share()
    )?;

    writeln!(out, "## 3. Seasonality\n")?;
    writeln!(out, "- Peak month: {}", report.peak_month.label())?;
    writeln!(out, "- Trough month: {}\n", report.trough_month.label())?;
    writeln!(out, "| Month | Mean exports (US$) | Years |")?;
    writeln!(out, "|---|---:|---:|")?;
    for seasonal in &report.seasonal_means {
        writeln!(
            out,
            "| {} | {} | {} |",
            seasonal.month.label(),
            format_currency(seasonal.mean_export),
            seasonal.observations
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## 4. Outliers\n")?;
    match report.outlier_threshold {
        Some(threshold) => {
            writeln!(
                out,
                "Months whose exports deviate from the rolling mean by more than US$ {}:\n",
                format_currency(threshold)
            )?;
        }
        None => writeln!(out, "Not enough months to estimate dispersion.\n")?,
    }
    if report.outliers.is_empty() {
        writeln!(out, "No outliers detected.")?;
    } else {
        writeln!(out, "| Period | Exports (US$) | Rolling mean (US$) | Deviation (US$) |")?;
        writeln!(out, "|---|---:|---:|---:|")?;
        for outlier in &report.outliers {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                outlier.period.label(),
                format_currency(outlier.export),
                format_currency(outlier.rolling_mean),
                format_currency(outlier.deviation)
            )?;
        }
    }
    writeln!(
        out,
        "\nThe threshold uses the standard deviation of the whole series, so a strongly \
         trending series may show more outliers than a local measure would."
    )
}
