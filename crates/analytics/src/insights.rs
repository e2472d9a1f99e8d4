//! Narrative findings over the per-category KPIs: which categories moved the
//! most in the latest year, and what to do about it.

use crate::eda::sample_std;
use core_types::{CategoryKpiRecord, KpiRecord, Month};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const NO_DATA_MESSAGE: &str =
    "**No data for the selected period.** Widen the filters to see insights.";

/// Recommended response to a category's year-over-year export change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionTier {
    /// YoY above 15%.
    Expand,
    /// YoY above 5%.
    Consolidate,
    /// YoY above −5%.
    Monitor,
    Review,
}

impl ActionTier {
    pub fn for_yoy(yoy: Decimal) -> Self {
        if yoy > Decimal::from(15) {
            ActionTier::Expand
        } else if yoy > Decimal::from(5) {
            ActionTier::Consolidate
        } else if yoy > Decimal::from(-5) {
            ActionTier::Monitor
        } else {
            ActionTier::Review
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            ActionTier::Expand => {
                "Expand trade promotion and production capacity while the momentum lasts."
            }
            ActionTier::Consolidate => {
                "Consolidate the positive trend with targeted trade missions."
            }
            ActionTier::Monitor => {
                "Monitor closely and prepare market diversification strategies."
            }
            ActionTier::Review => "Review sector policy and consider specific incentives.",
        }
    }
}

/// One ranked finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub rank: usize,
    pub category: String,
    pub year: i32,
    pub month: Month,
    pub export_yoy: Decimal,
    pub balance: Decimal,
    pub action: ActionTier,
}

impl Insight {
    pub fn is_surplus(&self) -> bool {
        self.balance > Decimal::ZERO
    }

    pub fn to_markdown(&self) -> String {
        let direction = if self.export_yoy > Decimal::ZERO { "grew" } else { "fell" };
        let position = if self.is_surplus() { "surplus" } else { "deficit" };
        format!(
            "### Insight #{rank}: {category}\n\n\
             **Finding:** exports of **{category}** {direction} **{yoy:+.1}% YoY** in {month} {year}.\n\n\
             **Impact:** contributes US$ {amount} to the trade {position}.\n\n\
             **Action:** {action}",
            rank = self.rank,
            category = self.category,
            yoy = self.export_yoy.to_f64().unwrap_or_default(),
            month = self.month.short_name(),
            year = self.year,
            amount = format_currency(self.balance.abs().to_f64().unwrap_or_default()),
            action = self.action.recommendation(),
        )
    }
}

/// Formats a dollar amount with a K/M/B suffix.
pub fn format_currency(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else {
        format!("{:.1}K", value / 1e3)
    }
}

/// Ranks the latest year's category rows by absolute export YoY.
#[derive(Debug, Clone)]
pub struct InsightsEngine {
    top_n: usize,
}

impl Default for InsightsEngine {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

impl InsightsEngine {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn build(&self, rows: &[CategoryKpiRecord]) -> Vec<Insight> {
        let Some(latest_year) = rows.iter().map(|r| r.kpi.year).max() else {
            return Vec::new();
        };

        let mut candidates: Vec<(&CategoryKpiRecord, Decimal, Decimal)> = rows
            .iter()
            .filter(|r| r.kpi.year == latest_year)
            .filter_map(|r| Some((r, r.kpi.export_yoy?, r.kpi.balance?)))
            .collect();
        // Stable sort: equal magnitudes keep category/period order.
        candidates.sort_by(|a, b| b.1.abs().cmp(&a.1.abs()));

        candidates
            .into_iter()
            .take(self.top_n)
            .enumerate()
            .map(|(i, (row, yoy, balance))| Insight {
                rank: i + 1,
                category: row.category.clone(),
                year: row.kpi.year,
                month: row.kpi.month,
                export_yoy: yoy,
                balance,
                action: ActionTier::for_yoy(yoy),
            })
            .collect()
    }

    /// Markdown findings; a single "no data" message when nothing qualifies.
    pub fn narrate(&self, rows: &[CategoryKpiRecord]) -> Vec<String> {
        let insights = self.build(rows);
        if insights.is_empty() {
            return vec![NO_DATA_MESSAGE.to_string()];
        }
        insights.iter().map(Insight::to_markdown).collect()
    }

    /// Headline figures for the insights panel. `None` without any rows.
    pub fn quick_stats(&self, rows: &[CategoryKpiRecord]) -> Option<QuickStats> {
        let year = rows.iter().map(|r| r.kpi.year).max()?;
        let active_categories = rows
            .iter()
            .map(|r| r.category.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        // First maximum wins, so ties keep category/period order.
        let best = rows
            .iter()
            .filter(|r| r.kpi.year == year)
            .filter_map(|r| Some((r, r.kpi.export_usd?)))
            .filter(|(_, export)| *export > Decimal::ZERO)
            .fold(None::<(&CategoryKpiRecord, Decimal)>, |best, (row, export)| match best {
                Some((_, top)) if top >= export => best,
                _ => Some((row, export)),
            });

        let yoy: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.kpi.export_yoy.and_then(|v| v.to_f64()))
            .collect();

        Some(QuickStats {
            year,
            active_categories,
            best_month: best.map(|(row, _)| row.kpi.month),
            best_category: best.map(|(row, _)| row.category.clone()),
            yoy_volatility: sample_std(&yoy).unwrap_or(0.0),
        })
    }
}

/// Latest year, breadth and volatility of the category data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickStats {
    pub year: i32,
    /// Distinct categories over every year of the input.
    pub active_categories: usize,
    /// Month of the single largest positive category export in `year`.
    pub best_month: Option<Month>,
    pub best_category: Option<String>,
    /// Sample standard deviation of every export YoY, in points; zero when
    /// fewer than two are defined.
    pub yoy_volatility: f64,
}

/// National position and leading category of the latest year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    pub year: i32,
    pub total_exports: Decimal,
    pub balance: Decimal,
    pub top_category: Option<String>,
    pub top_category_exports: Decimal,
    /// Share of national exports, in percent; zero when exports are zero.
    pub top_category_share: Decimal,
}

impl ExecutiveSummary {
    pub fn build(national: &[KpiRecord], categories: &[CategoryKpiRecord]) -> Option<Self> {
        let year = national.iter().map(|r| r.year).max()?;
        let latest = national.iter().filter(|r| r.year == year);
        let total_exports: Decimal = latest.clone().filter_map(|r| r.export_usd).sum();
        let total_imports: Decimal = latest.filter_map(|r| r.import_usd).sum();

        let mut by_category: BTreeMap<&str, Decimal> = BTreeMap::new();
        for row in categories.iter().filter(|r| r.kpi.year == year) {
            *by_category.entry(row.category.as_str()).or_default() +=
                row.kpi.export_usd.unwrap_or_default();
        }
        let top = by_category
            .into_iter()
            .fold(None::<(&str, Decimal)>, |best, (category, value)| match best {
                Some((_, v)) if v >= value => best,
                _ => Some((category, value)),
            });

        let top_category_exports = top.map(|(_, v)| v).unwrap_or_default();
        let top_category_share = if total_exports > Decimal::ZERO {
            top_category_exports / total_exports * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Some(Self {
            year,
            total_exports,
            balance: total_exports - total_imports,
            top_category: top.map(|(c, _)| c.to_string()),
            top_category_exports,
            top_category_share,
        })
    }

    pub fn to_markdown(&self) -> String {
        let position = if self.balance > Decimal::ZERO { "surplus" } else { "deficit" };
        let category = self.top_category.as_deref().unwrap_or("N/A");
        format!(
            "## Executive summary {year}\n\n\
             - **Total exports:** US$ {exports}\n\
             - **Trade balance:** US$ {balance} ({position})\n\
             - **Leading category:** {category}, US$ {top} ({share:.1}% of exports)",
            year = self.year,
            exports = format_currency(self.total_exports.to_f64().unwrap_or_default()),
            balance = format_currency(self.balance.to_f64().unwrap_or_default()),
            top = format_currency(self.top_category_exports.to_f64().unwrap_or_default()),
            share = self.top_category_share.to_f64().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kpi(year: i32, month: Month, export: Decimal, yoy: Option<Decimal>, balance: Option<Decimal>) -> KpiRecord {
        KpiRecord {
            year,
            month,
            export_usd: Some(export),
            import_usd: balance.map(|b| export - b),
            balance,
            export_mom: None,
            export_yoy: yoy,
            import_mom: None,
            import_yoy: None,
            export_ma3: None,
            import_ma3: None,
            balance_ma3: None,
            export_index: None,
            import_index: None,
            coverage_ratio: None,
        }
    }

    fn row(category: &str, year: i32, yoy: Option<Decimal>, balance: Option<Decimal>) -> CategoryKpiRecord {
        CategoryKpiRecord {
            category: category.to_string(),
            kpi: kpi(year, Month::December, dec!(1000), yoy, balance),
        }
    }

    #[test]
    fn ranks_latest_year_by_absolute_yoy() {
        let rows = vec![
            row("Cobre", 2024, Some(dec!(80)), Some(dec!(1))),
            row("Cobre", 2025, Some(dec!(4)), Some(dec!(2500000))),
            row("Oro", 2025, Some(dec!(-30)), Some(dec!(-1000))),
            row("Café", 2025, Some(dec!(12)), Some(dec!(3000000000))),
            row("Pesca", 2025, Some(dec!(20)), None),
            row("Uvas", 2025, None, Some(dec!(5))),
        ];
        let insights = InsightsEngine::default().build(&rows);

        let order: Vec<_> = insights.iter().map(|i| i.category.as_str()).collect();
        assert_eq!(order, vec!["Oro", "Café", "Cobre"]);
        assert_eq!(insights[0].rank, 1);
        assert_eq!(insights[0].action, ActionTier::Review);
        assert_eq!(insights[1].action, ActionTier::Consolidate);
        assert_eq!(insights[2].action, ActionTier::Monitor);
        assert!(!insights[0].is_surplus());
    }

    #[test]
    fn action_tiers() {
        assert_eq!(ActionTier::for_yoy(dec!(15.1)), ActionTier::Expand);
        assert_eq!(ActionTier::for_yoy(dec!(15)), ActionTier::Consolidate);
        assert_eq!(ActionTier::for_yoy(dec!(5)), ActionTier::Monitor);
        assert_eq!(ActionTier::for_yoy(dec!(-5)), ActionTier::Review);
    }

    #[test]
    fn empty_input_yields_a_single_message() {
        let messages = InsightsEngine::default().narrate(&[]);
        assert_eq!(messages, vec![NO_DATA_MESSAGE.to_string()]);

        let unusable = vec![row("Oro", 2025, None, None)];
        assert_eq!(InsightsEngine::default().narrate(&unusable).len(), 1);
    }

    #[test]
    fn markdown_names_category_and_signed_change() {
        let rows = vec![row("Café", 2025, Some(dec!(-12.34)), Some(dec!(-2500000)))];
        let text = &InsightsEngine::default().narrate(&rows)[0];
        assert!(text.contains("Café"));
        assert!(text.contains("-12.3% YoY"));
        assert!(text.contains("Dec 2025"));
        assert!(text.contains("US$ 2.5M"));
        assert!(text.contains("deficit"));
    }

    #[test]
    fn currency_suffixes() {
        assert_eq!(format_currency(2_500_000_000.0), "2.5B");
        assert_eq!(format_currency(-3_200_000.0), "-3.2M");
        assert_eq!(format_currency(900.0), "0.9K");
    }

    #[test]
    fn quick_stats_over_two_categories_and_years() {
        let rows = vec![
            CategoryKpiRecord { category: "Cobre".into(), kpi: kpi(2024, Month::June, dec!(5000), None, None) },
            CategoryKpiRecord { category: "Cobre".into(), kpi: kpi(2025, Month::January, dec!(700), Some(dec!(10)), None) },
            CategoryKpiRecord { category: "Uvas".into(), kpi: kpi(2024, Month::July, dec!(50), None, None) },
            CategoryKpiRecord { category: "Uvas".into(), kpi: kpi(2025, Month::March, dec!(900), Some(dec!(30)), None) },
        ];
        let stats = InsightsEngine::default().quick_stats(&rows).unwrap();

        assert_eq!(stats.year, 2025);
        assert_eq!(stats.active_categories, 2);
        // 2024's larger June export is outside the latest year.
        assert_eq!(stats.best_month, Some(Month::March));
        assert_eq!(stats.best_category.as_deref(), Some("Uvas"));
        // std of [10, 30]
        assert!((stats.yoy_volatility - 200f64.sqrt()).abs() < 1e-9);

        assert_eq!(InsightsEngine::default().quick_stats(&[]), None);
        let single = &rows[..1];
        assert_eq!(InsightsEngine::default().quick_stats(single).unwrap().yoy_volatility, 0.0);
    }

    #[test]
    fn executive_summary_reports_leading_share() {
        let national = vec![
            kpi(2024, Month::January, dec!(999), None, Some(dec!(0))),
            kpi(2025, Month::January, dec!(600), None, Some(dec!(100))),
            kpi(2025, Month::February, dec!(400), None, Some(dec!(-300))),
        ];
        let categories = vec![
            CategoryKpiRecord { category: "Cobre".into(), kpi: kpi(2025, Month::January, dec!(250), None, None) },
            CategoryKpiRecord { category: "Oro".into(), kpi: kpi(2025, Month::January, dec!(150), None, None) },
            CategoryKpiRecord { category: "Oro".into(), kpi: kpi(2025, Month::February, dec!(150), None, None) },
        ];
        let summary = ExecutiveSummary::build(&national, &categories).unwrap();

        assert_eq!(summary.year, 2025);
        assert_eq!(summary.total_exports, dec!(1000));
        assert_eq!(summary.balance, dec!(-200));
        assert_eq!(summary.top_category.as_deref(), Some("Oro"));
        assert_eq!(summary.top_category_share, dec!(30));
        assert!(summary.to_markdown().contains("deficit"));
    }
}
