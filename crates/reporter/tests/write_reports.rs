use analytics::{EdaAnalyzer, Observation};
use core_types::{Month, Period};
use reporter::{write_reports, Chart, SUMMARY_FILE};

fn two_years() -> Vec<Observation> {
    (0..24)
        .map(|i| {
            let export = 1_000.0 + (i % 12) as f64 * 10.0;
            Observation {
                period: Period::new(2023 + i / 12, Month::ALL[(i % 12) as usize]),
                export,
                import: 1_050.0,
                balance: export - 1_050.0,
            }
        })
        .collect()
}

#[test]
fn writes_summary_and_every_chart() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("reports").join("eda");
    let report = EdaAnalyzer::default().analyze(&two_years()).unwrap();

    let written = write_reports(&target, &report).unwrap();

    assert_eq!(written.len(), Chart::ALL.len() + 1);
    assert!(target.join(SUMMARY_FILE).is_file());
    for chart in Chart::ALL {
        let html = std::fs::read_to_string(target.join(chart.file_name())).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Plotly.newPlot"));
    }

    let summary = std::fs::read_to_string(target.join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("Peak month: Diciembre"));
    assert!(summary.contains("Surplus months: 12 of 24"));
}

#[test]
fn rerun_overwrites_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let report = EdaAnalyzer::default().analyze(&two_years()).unwrap();

    let first = write_reports(dir.path(), &report).unwrap();
    let second = write_reports(dir.path(), &report).unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), Chart::ALL.len() + 1);
}
