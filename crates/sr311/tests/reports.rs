use anyhow::Result;
use chrono::{TimeZone, Utc};
use sr311::findings::Findings;
use sr311::report::{self, Marker, Reporter};
use sr311::{Status, Thresholds, run_checks};
use std::path::PathBuf;

fn sample_csv() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test_data/chi311_sample.csv")
}

#[test]
fn test_csv_checks_and_findings() -> Result<()> {
    let dataset = sr311::source::load_csv(Some(&sample_csv()))?;
    assert_eq!(dataset.len(), 6);
    assert!(dataset.source_label.ends_with("chi311_sample.csv)"));

    let now = Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap();
    let checks = run_checks(&dataset, &Thresholds::default(), now);
    assert_eq!(checks.overall, Status::Fail);

    let by_name = |name: &str| {
        checks
            .checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| (c.status, c.detail.clone()))
            .unwrap()
    };
    assert_eq!(by_name("Duplicate SR numbers"), (Status::Fail, "duplicates=1".to_string()));
    assert_eq!(by_name("Closed before created"), (Status::Fail, "count=1".to_string()));
    assert_eq!(
        by_name("Coordinate anomalies (null/zero)"),
        (Status::Warn, "count=3 (50.00%)".to_string())
    );
    assert_eq!(by_name("Legacy records present").0, Status::Warn);
    assert_eq!(by_name("Information-only address dominance").0, Status::Info);

    let findings = Findings::collect(&dataset, now);
    assert_eq!(findings.duplicates, Some(1));
    assert_eq!(findings.info_only.count, 2);
    assert_eq!(findings.info_only.top_clusters[0].count, 2);
    assert_eq!(findings.missing[0].column, "closed_date");
    Ok(())
}

#[test]
fn test_reports_and_markers_written() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let notes = dir.path().join("notes");
    let dataset = sr311::source::load_csv(Some(&sample_csv()))?;
    let now = Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap();
    let reporter = Reporter::new()?;

    let findings_path = notes.join("data_quality_findings.md");
    report::write_report(&findings_path, &reporter.findings(&Findings::collect(&dataset, now))?)?;
    let checks_path = notes.join("data_quality_checks.md");
    let checks = run_checks(&dataset, &Thresholds::default(), now);
    report::write_report(&checks_path, &reporter.checks(&checks)?)?;
    report::write_marker(&notes, Marker::Check)?;

    let findings_text = std::fs::read_to_string(findings_path)?;
    assert!(findings_text.starts_with("# Chicago 311 Service Requests – Data Quality Findings\n"));
    assert!(findings_text.contains("- Number of rows pulled: **6**"));
    assert!(findings_text.contains("  - (41.872, -87.682): 2\n"));

    let checks_text = std::fs::read_to_string(checks_path)?;
    assert!(checks_text.contains("- Overall: **FAIL**"));
    assert!(checks_text.contains("| Duplicate SR numbers | FAIL | duplicates=1 |"));

    assert_eq!(std::fs::read_to_string(notes.join(".STEP2_DONE"))?, "done\n");
    Ok(())
}
