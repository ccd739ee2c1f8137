//! Markdown reports and pipeline step markers

use crate::checks::CheckReport;
use crate::columns::DATE_FIELD_CANDIDATES;
use crate::dates;
use crate::error::Result;
use crate::fetch::{FetchMode, FetchOutcome};
use crate::findings::Findings;
use crate::models::Dataset;
use chrono::{DateTime, Utc};
use diagnostics::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera, Value};

const INGEST_SUMMARY: &str = "ingest_summary.md";
const FINDINGS: &str = "findings.md";
const CHECKS: &str = "checks.md";

/// Earliest and latest parsed value of one date column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub column: String,
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedView {
    pub column: String,
    pub comparison: String,
    pub reason: String,
}

/// How the rows were fetched, for the summary
#[derive(Debug, Clone, Serialize)]
pub struct FetchView {
    pub filter: Option<String>,
    pub date_columns: Vec<String>,
    pub pages: usize,
    pub stop: String,
    pub rejected: Vec<RejectedView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub source_label: String,
    pub rows: usize,
    pub date_range: Option<DateRange>,
    pub fetch: Option<FetchView>,
}

impl IngestSummary {
    pub fn new(dataset: &Dataset, outcome: Option<&FetchOutcome>) -> Self {
        Self {
            source_label: dataset.source_label.clone(),
            rows: dataset.len(),
            date_range: date_range(dataset),
            fetch: outcome.map(fetch_view),
        }
    }
}

fn fetch_view(outcome: &FetchOutcome) -> FetchView {
    let (filter, date_columns) = match &outcome.mode {
        FetchMode::ServerFiltered(filter) => (Some(filter.filter.clone()), vec![filter.column.clone()]),
        FetchMode::Blind { date_columns, .. } => (None, date_columns.clone()),
    };
    FetchView {
        filter,
        date_columns,
        pages: outcome.page_sizes.len(),
        stop: outcome.stop.to_string(),
        rejected: outcome
            .rejected
            .iter()
            .map(|a| RejectedView {
                column: a.column.clone(),
                comparison: a.comparison.to_string(),
                reason: format!("HTTP {} {:?}", a.status, a.kind),
            })
            .collect(),
    }
}

fn timestamp_text(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

/// Range of the first date candidate column holding any parseable value
pub fn date_range(dataset: &Dataset) -> Option<DateRange> {
    DATE_FIELD_CANDIDATES
        .iter()
        .filter(|c| dataset.has_column(c))
        .find_map(|column| {
            let parsed = dataset.column_values(column).filter_map(dates::parse_value);
            let (min, max) = parsed.fold(None, |acc: Option<(DateTime<Utc>, DateTime<Utc>)>, d| {
                Some(match acc {
                    None => (d, d),
                    Some((lo, hi)) => (lo.min(d), hi.max(d)),
                })
            })?;
            Some(DateRange {
                column: column.to_string(),
                min: timestamp_text(min),
                max: timestamp_text(max),
            })
        })
}

/// `1234567` → `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn thousands_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    value
        .as_u64()
        .map(|n| Value::String(thousands(n)))
        .ok_or_else(|| tera::Error::msg(format!("thousands: expected an unsigned integer, got {value}")))
}

fn percent_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let digits = args.get("digits").and_then(Value::as_u64).unwrap_or(1) as usize;
    value
        .as_f64()
        .map(|v| Value::String(format!("{v:.digits$}%")))
        .ok_or_else(|| tera::Error::msg(format!("percent: expected a number, got {value}")))
}

/// Null renders as `N/A`
fn na_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(match value {
        Value::Null => Value::String("N/A".to_string()),
        other => other.clone(),
    })
}

/// Renders the Markdown reports
pub struct Reporter {
    tera: Tera,
}

impl Reporter {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (INGEST_SUMMARY, include_str!("templates/ingest_summary.md")),
            (FINDINGS, include_str!("templates/findings.md")),
            (CHECKS, include_str!("templates/checks.md")),
        ])?;
        tera.register_filter("thousands", thousands_filter);
        tera.register_filter("percent", percent_filter);
        tera.register_filter("na", na_filter);
        Ok(Self { tera })
    }

    fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        let context = Context::from_serialize(data)?;
        Ok(self.tera.render(template, &context)?)
    }

    pub fn ingest_summary(&self, summary: &IngestSummary) -> Result<String> {
        self.render(INGEST_SUMMARY, summary)
    }

    pub fn findings(&self, findings: &Findings) -> Result<String> {
        self.render(FINDINGS, findings)
    }

    pub fn checks(&self, report: &CheckReport) -> Result<String> {
        self.render(CHECKS, report)
    }
}

/// Create the parent directory of `path` if it has one
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn write_report(path: &Path, content: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, content)?;
    let display = path.display().to_string();
    info!("Wrote report {display}");
    Ok(())
}

/// Completion markers read by downstream pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Ingest,
    Explore,
    Check,
}

impl Marker {
    pub fn file_name(self) -> &'static str {
        match self {
            Marker::Ingest => ".INGEST_DONE",
            Marker::Explore => ".STEP1_DONE",
            Marker::Check => ".STEP2_DONE",
        }
    }
}

/// Write `done\n` to the marker file under `notes_dir`
pub fn write_marker(notes_dir: &Path, marker: Marker) -> Result<PathBuf> {
    std::fs::create_dir_all(notes_dir)?;
    let path = notes_dir.join(marker.file_name());
    std::fs::write(&path, "done\n")?;
    Ok(path)
}
