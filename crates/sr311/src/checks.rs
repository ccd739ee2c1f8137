//! Pass/warn/fail quality gate over a loaded dataset

use crate::columns::{LogicalField, ResolvedColumns};
use crate::config::Thresholds;
use crate::findings::{self, is_information_only};
use crate::models::Dataset;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Logical fields that must exist and be largely populated
pub const REQUIRED_FIELDS: [LogicalField; 4] = [
    LogicalField::SrNumber,
    LogicalField::Type,
    LogicalField::Status,
    LogicalField::CreatedDate,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Info,
    Warn,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pass => "PASS",
            Status::Info => "INFO",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    pub status: Status,
    pub detail: String,
}

impl Check {
    fn new(name: impl Into<String>, status: Status, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub source_label: String,
    pub rows: usize,
    pub overall: Status,
    pub checks: Vec<Check>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.overall == Status::Pass
    }
}

/// FAIL if any check failed, else WARN if any warned, else PASS.
/// INFO never affects the outcome.
pub fn overall_status(checks: &[Check]) -> Status {
    if checks.iter().any(|c| c.status == Status::Fail) {
        Status::Fail
    } else if checks.iter().any(|c| c.status == Status::Warn) {
        Status::Warn
    } else {
        Status::Pass
    }
}

fn rate_text(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn count_text(count: Option<usize>) -> String {
    count.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

/// A positive count fails; an uncomputable one passes
fn fail_if_any(name: &str, count: Option<usize>) -> Check {
    let status = match count {
        Some(n) if n > 0 => Status::Fail,
        _ => Status::Pass,
    };
    Check::new(name, status, format!("count={}", count_text(count)))
}

pub fn run_checks(dataset: &Dataset, thresholds: &Thresholds, now: DateTime<Utc>) -> CheckReport {
    let n = dataset.len();
    let cols = ResolvedColumns::resolve(&dataset.columns);
    let mut checks = Vec::new();

    for field in REQUIRED_FIELDS {
        let key = field.key();
        let Some(column) = cols.get(field) else {
            checks.push(Check::new(
                format!("Required field present: {key}"),
                Status::Fail,
                "Column missing",
            ));
            continue;
        };
        let missing = findings::missing_count(dataset, column);
        let rate = findings::percent(missing, n);
        let status = if rate <= thresholds.required_null_rate {
            Status::Pass
        } else {
            Status::Warn
        };
        checks.push(Check::new(
            format!("Completeness: {key}"),
            status,
            format!("missing={missing} ({})", rate_text(rate)),
        ));
    }

    match cols.get(LogicalField::SrNumber) {
        Some(column) => {
            let dups = findings::duplicate_count(dataset, column);
            let status = if dups > 0 { Status::Fail } else { Status::Pass };
            checks.push(Check::new("Duplicate SR numbers", status, format!("duplicates={dups}")));
        }
        None => checks.push(Check::new(
            "Duplicate SR numbers",
            Status::Fail,
            "sr_number column missing",
        )),
    }

    let temporal = findings::temporal_counts(
        dataset,
        cols.get(LogicalField::CreatedDate),
        cols.get(LogicalField::ClosedDate),
        now,
    );
    checks.push(fail_if_any("Future created_date", temporal.future_created));
    checks.push(fail_if_any("Future closed_date", temporal.future_closed));
    checks.push(fail_if_any("Closed before created", temporal.closed_before_created));

    const COORDS: &str = "Coordinate anomalies (null/zero)";
    match (cols.get(LogicalField::Lat), cols.get(LogicalField::Lon)) {
        (Some(lat), Some(lon)) => {
            let anomalies = findings::coordinate_anomalies(dataset, lat, lon);
            let rate = findings::percent(anomalies, n);
            let status = if rate <= thresholds.coordinate_anomaly_rate {
                Status::Pass
            } else {
                Status::Warn
            };
            checks.push(Check::new(
                COORDS,
                status,
                format!("count={anomalies} ({})", rate_text(rate)),
            ));
        }
        _ => checks.push(Check::new(COORDS, Status::Warn, "No lat/lon columns found")),
    }

    checks.push(legacy_check(dataset, &cols));
    checks.push(info_only_check(dataset, &cols, thresholds));

    CheckReport {
        source_label: dataset.source_label.clone(),
        rows: n,
        overall: overall_status(&checks),
        checks,
    }
}

fn legacy_check(dataset: &Dataset, cols: &ResolvedColumns) -> Check {
    let Some(column) = cols.get(LogicalField::Legacy) else {
        return Check::new("Legacy column present", Status::Warn, "No legacy column");
    };
    let counts = findings::value_counts(dataset.column_values(column), true);
    let legacy_true: usize = counts
        .iter()
        .filter(|c| c.value.eq_ignore_ascii_case("true"))
        .map(|c| c.count)
        .sum();
    let detail: serde_json::Map<String, serde_json::Value> = counts
        .into_iter()
        .map(|c| (c.value, c.count.into()))
        .collect();
    let status = if legacy_true > 0 { Status::Warn } else { Status::Pass };
    Check::new(
        "Legacy records present",
        status,
        serde_json::Value::Object(detail).to_string(),
    )
}

fn info_only_check(dataset: &Dataset, cols: &ResolvedColumns, thresholds: &Thresholds) -> Check {
    const NAME: &str = "Information-only address dominance";
    let Some(type_col) = cols.get(LogicalField::Type) else {
        return Check::new(NAME, Status::Pass, "No type column; skipped");
    };

    let info_rows: Vec<_> = dataset
        .records
        .iter()
        .filter(|r| r.get(type_col).is_some_and(is_information_only))
        .collect();

    let mut dominance = 0.0;
    let mut note = "N/A".to_string();
    if let (false, Some(addr)) = (info_rows.is_empty(), cols.get(LogicalField::Address)) {
        let counts = findings::value_counts(
            info_rows
                .iter()
                .map(|r| r.get(addr).unwrap_or(&serde_json::Value::Null)),
            false,
        );
        if let Some(top) = counts.first() {
            dominance = findings::percent(top.count, info_rows.len());
            note = format!(
                "info_calls={}, top_addr='{}', dominance={}",
                info_rows.len(),
                top.value,
                rate_text(dominance)
            );
        }
    }

    let status = if dominance >= thresholds.info_address_dominance {
        Status::Info
    } else {
        Status::Pass
    };
    Check::new(NAME, status, note)
}
