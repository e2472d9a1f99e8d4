use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use core_types::{CategoryTradeRecord, Flow, TradeRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one annual-total check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QaStatus {
    Pass,
    /// The monthly sum deviates from the annual total beyond tolerance.
    Mismatch,
    /// No "Total" row was parsed for this key, so nothing to compare against.
    MissingTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaEntry {
    pub year: i32,
    pub flow: Flow,
    pub category: Option<String>,
    pub annual_total: Option<Decimal>,
    pub monthly_sum: Decimal,
    /// `annual_total − monthly_sum`.
    pub difference: Decimal,
    /// |difference| / |annual_total|, undefined for a zero or missing total.
    pub relative_difference: Option<Decimal>,
    pub status: QaStatus,
}

/// The pass/fail list of one reconciliation run. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QaReport {
    pub entries: Vec<QaEntry>,
}

impl QaReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &QaEntry> {
        self.entries.iter().filter(|e| e.status != QaStatus::Pass)
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches().next().is_none()
    }

    /// Renders the report as a console table; with `only_failures` the passing
    /// rows are left out.
    pub fn to_table(&self, only_failures: bool) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            "Year", "Flow", "Category", "Annual total", "Sum of months", "Δ", "Δ %", "Status",
        ]);

        for entry in &self.entries {
            if only_failures && entry.status == QaStatus::Pass {
                continue;
            }
            table.add_row(vec![
                Cell::new(entry.year),
                Cell::new(entry.flow),
                Cell::new(entry.category.as_deref().unwrap_or("-")),
                Cell::new(
                    entry
                        .annual_total
                        .map(|t| format!("{:.0}", t))
                        .unwrap_or_else(|| "N/A".to_string()),
                )
                .set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.0}", entry.monthly_sum)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.2}", entry.difference)).set_alignment(CellAlignment::Right),
                Cell::new(
                    entry
                        .relative_difference
                        .map(|r| format!("{:.3}", r * Decimal::ONE_HUNDRED))
                        .unwrap_or_else(|| "-".to_string()),
                )
                .set_alignment(CellAlignment::Right),
                Cell::new(format!("{:?}", entry.status)),
            ]);
        }
        table
    }
}

/// Cross-checks summed monthly values against the parsed annual totals.
#[derive(Debug, Clone)]
pub struct QaReconciler {
    relative_tolerance: Decimal,
    absolute_tolerance: Decimal,
}

#[derive(Default)]
struct Accumulator {
    monthly_sum: Decimal,
    annual_total: Option<Decimal>,
}

impl QaReconciler {
    pub fn new(relative_tolerance: Decimal, absolute_tolerance: Decimal) -> Self {
        Self {
            relative_tolerance,
            absolute_tolerance,
        }
    }

    /// One entry per (year, flow) of the national table.
    pub fn reconcile(&self, records: &[TradeRecord]) -> QaReport {
        let mut groups: BTreeMap<(i32, Flow), Accumulator> = BTreeMap::new();
        for record in records {
            let acc = groups.entry((record.year, record.flow)).or_default();
            if record.is_total() {
                acc.annual_total = Some(record.usd);
            } else {
                acc.monthly_sum += record.usd;
            }
        }

        let entries = groups
            .into_iter()
            .map(|((year, flow), acc)| self.check(year, flow, None, acc))
            .collect();
        self.finish(entries)
    }

    /// One entry per (year, flow, category) of the category table.
    pub fn reconcile_categories(&self, records: &[CategoryTradeRecord]) -> QaReport {
        let mut groups: BTreeMap<(i32, Flow, &str), Accumulator> = BTreeMap::new();
        for record in records {
            let acc = groups
                .entry((record.year, record.flow, record.category.as_str()))
                .or_default();
            if record.month.is_total() {
                acc.annual_total = Some(record.usd);
            } else {
                acc.monthly_sum += record.usd;
            }
        }

        let entries = groups
            .into_iter()
            .map(|((year, flow, category), acc)| {
                self.check(year, flow, Some(category.to_string()), acc)
            })
            .collect();
        self.finish(entries)
    }

    fn check(&self, year: i32, flow: Flow, category: Option<String>, acc: Accumulator) -> QaEntry {
        let Some(total) = acc.annual_total else {
            return QaEntry {
                year,
                flow,
                category,
                annual_total: None,
                monthly_sum: acc.monthly_sum,
                difference: -acc.monthly_sum,
                relative_difference: None,
                status: QaStatus::MissingTotal,
            };
        };

        let difference = total - acc.monthly_sum;
        let relative_difference = if total.is_zero() {
            None
        } else {
            Some(difference.abs() / total.abs())
        };

        let within_absolute = difference.abs() <= self.absolute_tolerance;
        let within_relative = relative_difference
            .map(|r| r <= self.relative_tolerance)
            .unwrap_or(false);
        let status = if within_absolute || within_relative {
            QaStatus::Pass
        } else {
            QaStatus::Mismatch
        };

        QaEntry {
            year,
            flow,
            category,
            annual_total: Some(total),
            monthly_sum: acc.monthly_sum,
            difference,
            relative_difference,
            status,
        }
    }

    fn finish(&self, entries: Vec<QaEntry>) -> QaReport {
        let report = QaReport { entries };
        for entry in report.mismatches() {
            tracing::warn!(
                year = entry.year,
                flow = %entry.flow,
                category = entry.category.as_deref().unwrap_or("-"),
                difference = %entry.difference,
                status = ?entry.status,
                "ReconciliationMismatch: monthly sum does not match the annual total."
            );
        }
        report
    }
}
