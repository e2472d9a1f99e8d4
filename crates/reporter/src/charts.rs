//! Plotly figures built from an `EdaReport`.
//!
//! Each chart is a self-contained HTML document: the page loads Plotly.js from
//! its CDN and embeds the figure (traces + layout) as JSON.

use crate::error::ReportError;
use analytics::EdaReport;
use core_types::Month;
use serde::Serialize;
use serde_json::{json, Value};

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const EXPORT_COLOR: &str = "#1f77b4";
const IMPORT_COLOR: &str = "#d62728";
const BALANCE_COLOR: &str = "#2ca02c";

/// A Plotly figure: a list of traces plus a layout object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    /// Renders the figure into a standalone HTML page.
    pub fn to_html(&self, title: &str) -> Result<String, ReportError> {
        // "</" inside the inline script would close the tag early.
        let figure = serde_json::to_string(self)?.replace("</", "<\\/");
        Ok(format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head>\n\
             <meta charset=\"utf-8\">\n\
             <title>{title}</title>\n\
             <script src=\"{PLOTLY_CDN}\"></script>\n\
             </head>\n\
             <body>\n\
             <div id=\"chart\" style=\"width:100%;height:90vh;\"></div>\n\
             <script>\n\
             const figure = {figure};\n\
             Plotly.newPlot(\"chart\", figure.data, figure.layout, {{responsive: true}});\n\
             </script>\n\
             </body>\n\
             </html>\n"
        ))
    }
}

/// The charts written by the EDA stage, in the order they are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    TimeSeries,
    SeasonalHeatmap,
    MonthlyDistribution,
    Trend,
    Outliers,
    Dashboard,
}

impl Chart {
    pub const ALL: [Chart; 6] = [
        Chart::TimeSeries,
        Chart::SeasonalHeatmap,
        Chart::MonthlyDistribution,
        Chart::Trend,
        Chart::Outliers,
        Chart::Dashboard,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Chart::TimeSeries => "series_temporal.html",
            Chart::SeasonalHeatmap => "estacionalidad_heatmap.html",
            Chart::MonthlyDistribution => "distribucion_mensual.html",
            Chart::Trend => "tendencias.html",
            Chart::Outliers => "outliers.html",
            Chart::Dashboard => "dashboard_eda.html",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Chart::TimeSeries => "Monthly exports, imports and trade balance",
            Chart::SeasonalHeatmap => "Seasonality of exports (month x year)",
            Chart::MonthlyDistribution => "Distribution of exports by month",
            Chart::Trend => "Export trend: 12 and 24 month moving averages",
            Chart::Outliers => "Export outliers against the rolling mean",
            Chart::Dashboard => "Exploratory analysis dashboard",
        }
    }

    pub fn figure(&self, report: &EdaReport) -> Figure {
        match self {
            Chart::TimeSeries => time_series(report),
            Chart::SeasonalHeatmap => seasonal_heatmap(report),
            Chart::MonthlyDistribution => monthly_distribution(report),
            Chart::Trend => trend(report),
            Chart::Outliers => outliers(report),
            Chart::Dashboard => dashboard(report),
        }
    }
}

fn periods(report: &EdaReport) -> Vec<String> {
    report.observations.iter().map(|o| o.period.label()).collect()
}

fn month_labels() -> Vec<&'static str> {
    Month::ALL.iter().map(Month::label).collect()
}

fn export_line(report: &EdaReport) -> Value {
    json!({
        "type": "scatter",
        "mode": "lines",
        "name": "Exports",
        "x": periods(report),
        "y": report.observations.iter().map(|o| o.export).collect::<Vec<_>>(),
        "line": {"color": EXPORT_COLOR},
    })
}

pub fn time_series(report: &EdaReport) -> Figure {
    let x = periods(report);
    Figure {
        data: vec![
            export_line(report),
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": "Imports",
                "x": x,
                "y": report.observations.iter().map(|o| o.import).collect::<Vec<_>>(),
                "line": {"color": IMPORT_COLOR},
            }),
            json!({
                "type": "bar",
                "name": "Balance",
                "x": x,
                "y": report.observations.iter().map(|o| o.balance).collect::<Vec<_>>(),
                "marker": {"color": BALANCE_COLOR},
                "opacity": 0.5,
                "yaxis": "y2",
            }),
        ],
        layout: json!({
            "title": {"text": Chart::TimeSeries.title()},
            "hovermode": "x unified",
            "xaxis": {"title": {"text": "Period"}},
            "yaxis": {"title": {"text": "US$"}},
            "yaxis2": {"title": {"text": "Balance (US$)"}, "overlaying": "y", "side": "right"},
            "legend": {"orientation": "h"},
        }),
    }
}

pub fn seasonal_heatmap(report: &EdaReport) -> Figure {
    let grid = &report.seasonal_grid;
    Figure {
        data: vec![json!({
            "type": "heatmap",
            "x": grid.years,
            "y": month_labels(),
            "z": grid.values,
            "colorscale": "Viridis",
            "colorbar": {"title": {"text": "US$"}},
        })],
        layout: json!({
            "title": {"text": Chart::SeasonalHeatmap.title()},
            "xaxis": {"title": {"text": "Year"}, "dtick": 1},
            "yaxis": {"autorange": "reversed"},
        }),
    }
}

/// One box per calendar month with every year's export for that month.
pub fn monthly_distribution(report: &EdaReport) -> Figure {
    let data = Month::ALL
        .iter()
        .map(|month| {
            let values: Vec<f64> = report
                .observations
                .iter()
                .filter(|o| o.period.month == *month)
                .map(|o| o.export)
                .collect();
            json!({
                "type": "box",
                "name": month.label(),
                "y": values,
                "boxmean": true,
                "marker": {"color": EXPORT_COLOR},
            })
        })
        .collect();
    Figure {
        data,
        layout: json!({
            "title": {"text": Chart::MonthlyDistribution.title()},
            "yaxis": {"title": {"text": "Exports (US$)"}},
            "showlegend": false,
        }),
    }
}

pub fn trend(report: &EdaReport) -> Figure {
    let x: Vec<String> = report.trend.iter().map(|t| t.period.label()).collect();
    Figure {
        data: vec![
            export_line(report),
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": "MA 12",
                "x": x,
                "y": report.trend.iter().map(|t| t.ma12).collect::<Vec<_>>(),
                "line": {"dash": "dash"},
            }),
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": "MA 24",
                "x": x,
                "y": report.trend.iter().map(|t| t.ma24).collect::<Vec<_>>(),
                "line": {"dash": "dot"},
            }),
        ],
        layout: json!({
            "title": {"text": Chart::Trend.title()},
            "hovermode": "x unified",
            "yaxis": {"title": {"text": "Exports (US$)"}},
        }),
    }
}

pub fn outliers(report: &EdaReport) -> Figure {
    let annotations: Vec<Value> = report
        .outliers
        .iter()
        .map(|o| {
            json!({
                "x": o.period.label(),
                "y": o.export,
                "text": o.period.label(),
                "showarrow": true,
                "arrowhead": 2,
            })
        })
        .collect();
    Figure {
        data: vec![
            export_line(report),
            json!({
                "type": "scatter",
                "mode": "markers",
                "name": "Outliers",
                "x": report.outliers.iter().map(|o| o.period.label()).collect::<Vec<_>>(),
                "y": report.outliers.iter().map(|o| o.export).collect::<Vec<_>>(),
                "marker": {"color": IMPORT_COLOR, "size": 11, "symbol": "x"},
            }),
        ],
        layout: json!({
            "title": {"text": Chart::Outliers.title()},
            "yaxis": {"title": {"text": "Exports (US$)"}},
            "annotations": annotations,
        }),
    }
}

/// Moves a trace onto the subplot with the given 1-based index.
fn on_subplot(mut trace: Value, index: usize) -> Value {
    if let Some(object) = trace.as_object_mut() {
        let suffix = if index == 1 { String::new() } else { index.to_string() };
        object.insert("xaxis".to_string(), Value::String(format!("x{suffix}")));
        object.insert("yaxis".to_string(), Value::String(format!("y{suffix}")));
    }
    trace
}

/// Time series, seasonal means, trend and YoY change on a 2x2 grid.
pub fn dashboard(report: &EdaReport) -> Figure {
    let seasonal = json!({
        "type": "bar",
        "name": "Mean export by month",
        "x": report.seasonal_means.iter().map(|s| s.month.label()).collect::<Vec<_>>(),
        "y": report.seasonal_means.iter().map(|s| s.mean_export).collect::<Vec<_>>(),
        "marker": {"color": EXPORT_COLOR},
    });
    let ma12 = json!({
        "type": "scatter",
        "mode": "lines",
        "name": "MA 12",
        "x": report.trend.iter().map(|t| t.period.label()).collect::<Vec<_>>(),
        "y": report.trend.iter().map(|t| t.ma12).collect::<Vec<_>>(),
    });
    let yoy = json!({
        "type": "bar",
        "name": "Export YoY %",
        "x": periods(report),
        "y": report.export_yoy,
        "marker": {"color": BALANCE_COLOR},
    });

    Figure {
        data: vec![
            on_subplot(export_line(report), 1),
            on_subplot(seasonal, 2),
            on_subplot(ma12, 3),
            on_subplot(yoy, 4),
        ],
        layout: json!({
            "title": {"text": Chart::Dashboard.title()},
            "grid": {"rows": 2, "columns": 2, "pattern": "independent"},
            "showlegend": false,
            "annotations": [
                subplot_title("Monthly exports", "x domain", "y domain"),
                subplot_title("Seasonality", "x2 domain", "y2 domain"),
                subplot_title("12 month trend", "x3 domain", "y3 domain"),
                subplot_title("Year-over-year change", "x4 domain", "y4 domain"),
            ],
        }),
    }
}

fn subplot_title(text: &str, xref: &str, yref: &str) -> Value {
    json!({
        "text": text,
        "xref": xref,
        "yref": yref,
        "x": 0.5,
        "y": 1.12,
        "showarrow": false,
        "font": {"size": 14},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::{EdaAnalyzer, Observation};
    use core_types::Period;

    fn report(months: usize) -> EdaReport {
        let observations: Vec<Observation> = (0..months)
            .map(|i| {
                let export = if i == 20 { 900.0 } else { 100.0 + i as f64 };
                Observation {
                    period: Period::new(2010 + (i / 12) as i32, Month::ALL[i % 12]),
                    export,
                    import: 95.0,
                    balance: export - 95.0,
                }
            })
            .collect();
        EdaAnalyzer::default().analyze(&observations).unwrap()
    }

    #[test]
    fn heatmap_has_a_row_per_month_and_a_column_per_year() {
        let figure = seasonal_heatmap(&report(30));
        let trace = &figure.data[0];
        assert_eq!(trace["x"], json!([2010, 2011, 2012]));
        assert_eq!(trace["z"].as_array().unwrap().len(), 12);
        // 2012 only reaches June.
        assert_eq!(trace["z"][11][2], Value::Null);
    }

    #[test]
    fn distribution_has_one_box_per_month() {
        let figure = monthly_distribution(&report(24));
        assert_eq!(figure.data.len(), 12);
        assert_eq!(figure.data[0]["name"], "Enero");
        assert_eq!(figure.data[0]["y"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn outliers_are_marked_and_annotated() {
        let report = report(36);
        assert!(!report.outliers.is_empty());
        let figure = outliers(&report);
        assert_eq!(figure.data[1]["x"][0], "2011-09");
        assert_eq!(
            figure.layout["annotations"].as_array().unwrap().len(),
            report.outliers.len()
        );
    }

    #[test]
    fn dashboard_places_traces_on_four_subplots() {
        let figure = dashboard(&report(24));
        let axes: Vec<_> = figure.data.iter().map(|t| t["xaxis"].clone()).collect();
        assert_eq!(axes, vec![json!("x"), json!("x2"), json!("x3"), json!("x4")]);
        assert_eq!(figure.layout["grid"]["rows"], 2);
    }

    #[test]
    fn html_embeds_figure_and_loads_plotly() {
        let html = time_series(&report(12)).to_html("Series").unwrap();
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("<title>Series</title>"));
        assert!(html.contains("\"name\":\"Imports\""));
    }

    #[test]
    fn closing_tags_in_labels_are_escaped() {
        let figure = Figure {
            data: vec![json!({"name": "</script>"})],
            layout: json!({}),
        };
        let html = figure.to_html("t").unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
    }
}
