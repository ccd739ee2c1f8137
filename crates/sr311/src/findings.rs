//! Exploratory data-quality findings and the counters the checks share

use crate::columns::{LogicalField, ResolvedColumns};
use crate::dates;
use crate::models::{Dataset, is_missing, value_number, value_text};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

const MISSING_TOP: usize = 20;
const INFO_TOP: usize = 5;

/// Missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
    /// 0..=100
    pub percent: f64,
}

/// One distinct value and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Coordinates rounded to three decimals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub lat: f64,
    pub lon: f64,
    pub count: usize,
}

/// `None` means the count could not be computed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemporalCounts {
    pub future_created: Option<usize>,
    pub future_closed: Option<usize>,
    pub closed_before_created: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoOnly {
    pub count: usize,
    pub top_addresses: Vec<ValueCount>,
    pub top_clusters: Vec<Cluster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Findings {
    pub source_label: String,
    pub rows: usize,
    pub columns_sorted: Vec<String>,
    pub missing: Vec<MissingCount>,
    pub sr_column: Option<String>,
    pub duplicates: Option<usize>,
    pub temporal: TemporalCounts,
    pub coordinate_anomalies: Option<usize>,
    pub legacy_column: Option<String>,
    pub legacy_counts: Vec<ValueCount>,
    pub info_only: InfoOnly,
}

impl Findings {
    pub fn collect(dataset: &Dataset, now: DateTime<Utc>) -> Self {
        let cols = ResolvedColumns::resolve(&dataset.columns);

        let mut columns_sorted = dataset.columns.clone();
        columns_sorted.sort();

        let mut missing = missing_counts(dataset);
        missing.sort_by(|a, b| b.missing.cmp(&a.missing));
        missing.truncate(MISSING_TOP);

        let sr_column = cols.get(LogicalField::SrNumber);

        // Dates that never hold a value are treated as absent
        let populated = |field| cols.get(field).filter(|c| has_values(dataset, c));
        let temporal = temporal_counts(
            dataset,
            populated(LogicalField::CreatedDate),
            populated(LogicalField::ClosedDate),
            now,
        );

        let coordinate_anomalies = match (
            cols.get(LogicalField::Lat),
            cols.get(LogicalField::Lon),
            cols.get(LogicalField::X),
            cols.get(LogicalField::Y),
        ) {
            (Some(lat), Some(lon), _, _) => Some(coordinate_anomalies(dataset, lat, lon)),
            (_, _, Some(x), Some(y)) => Some(coordinate_anomalies(dataset, x, y)),
            _ => None,
        };

        let legacy_column = cols.get(LogicalField::Legacy);
        let legacy_counts = legacy_column
            .map(|c| value_counts(dataset.column_values(c), true))
            .unwrap_or_default();

        Self {
            source_label: dataset.source_label.clone(),
            rows: dataset.len(),
            columns_sorted,
            missing,
            sr_column: sr_column.map(str::to_string),
            duplicates: sr_column.map(|c| duplicate_count(dataset, c)),
            temporal,
            coordinate_anomalies,
            legacy_column: legacy_column.map(str::to_string),
            legacy_counts,
            info_only: info_only(dataset, &cols),
        }
    }
}

/// Missing counts for every column, in dataset column order
pub fn missing_counts(dataset: &Dataset) -> Vec<MissingCount> {
    let rows = dataset.len();
    dataset
        .columns
        .iter()
        .map(|column| {
            let missing = missing_count(dataset, column);
            MissingCount {
                column: column.clone(),
                missing,
                percent: percent(missing, rows) * 100.0,
            }
        })
        .collect()
}

pub(crate) fn missing_count(dataset: &Dataset, column: &str) -> usize {
    dataset.column_values(column).filter(|v| is_missing(v)).count()
}

fn has_values(dataset: &Dataset, column: &str) -> bool {
    dataset.column_values(column).any(|v| !is_missing(v))
}

/// Share of `n` in `d`; zero when `d` is zero
pub(crate) fn percent(n: usize, d: usize) -> f64 {
    if d == 0 { 0.0 } else { n as f64 / d as f64 }
}

/// Rows whose value already appeared in an earlier row
pub(crate) fn duplicate_count(dataset: &Dataset, column: &str) -> usize {
    let mut seen = std::collections::HashSet::new();
    dataset
        .column_values(column)
        .filter(|v| !seen.insert(v.to_string()))
        .count()
}

pub(crate) fn temporal_counts(
    dataset: &Dataset,
    created: Option<&str>,
    closed: Option<&str>,
    now: DateTime<Utc>,
) -> TemporalCounts {
    let parse = |column: &str| -> Vec<Option<DateTime<Utc>>> {
        dataset.column_values(column).map(dates::parse_value).collect()
    };
    let created_dt = created.map(parse);
    let closed_dt = closed.map(parse);

    let future = |parsed: &Vec<Option<DateTime<Utc>>>| {
        parsed.iter().flatten().filter(|d| **d > now).count()
    };

    let closed_before_created = match (&created_dt, &closed_dt) {
        (Some(created), Some(closed)) => Some(
            created
                .iter()
                .zip(closed)
                .filter(|(a, b)| matches!((a, b), (Some(a), Some(b)) if b < a))
                .count(),
        ),
        _ => None,
    };

    TemporalCounts {
        future_created: created_dt.as_ref().map(future),
        future_closed: closed_dt.as_ref().map(future),
        closed_before_created,
    }
}

/// Rows where either coordinate is non-numeric, missing or exactly zero
pub(crate) fn coordinate_anomalies(dataset: &Dataset, a: &str, b: &str) -> usize {
    dataset
        .records
        .iter()
        .filter(|r| {
            let bad = |c: &str| {
                r.get(c)
                    .and_then(value_number)
                    .is_none_or(|v| v == 0.0)
            };
            bad(a) || bad(b)
        })
        .count()
}

/// Distinct values by descending count, ties in first-appearance order
pub(crate) fn value_counts<'a>(
    values: impl Iterator<Item = &'a serde_json::Value>,
    keep_missing: bool,
) -> Vec<ValueCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for value in values {
        if is_missing(value) && !keep_missing {
            continue;
        }
        let key = value_text(value).unwrap_or_else(|| "null".to_string());
        match index.get(&key) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push(ValueCount { value: key, count: 1 });
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Service request types such as "Information Only Call"
pub(crate) fn is_information_only(value: &serde_json::Value) -> bool {
    value_text(value).is_some_and(|t| {
        let t = t.to_lowercase();
        t.contains("information") && t.contains("only")
    })
}

fn info_only(dataset: &Dataset, cols: &ResolvedColumns) -> InfoOnly {
    let Some(type_col) = cols.get(LogicalField::Type) else {
        return InfoOnly::default();
    };
    let rows: Vec<_> = dataset
        .records
        .iter()
        .filter(|r| r.get(type_col).is_some_and(is_information_only))
        .collect();
    if rows.is_empty() {
        return InfoOnly::default();
    }

    let top_addresses = cols
        .get(LogicalField::Address)
        .map(|addr| {
            let mut counts = value_counts(
                rows.iter().map(|r| r.get(addr).unwrap_or(&serde_json::Value::Null)),
                false,
            );
            counts.truncate(INFO_TOP);
            counts
        })
        .unwrap_or_default();

    let top_clusters = match (cols.get(LogicalField::Lat), cols.get(LogicalField::Lon)) {
        (Some(lat), Some(lon)) => {
            let mut order: Vec<(i64, i64)> = Vec::new();
            let mut tally: HashMap<(i64, i64), usize> = HashMap::new();
            for r in &rows {
                let (Some(la), Some(lo)) = (
                    r.get(lat).and_then(value_number),
                    r.get(lon).and_then(value_number),
                ) else {
                    continue;
                };
                let key = (milli(la), milli(lo));
                let n = tally.entry(key).or_insert(0);
                if *n == 0 {
                    order.push(key);
                }
                *n += 1;
            }
            let mut clusters: Vec<Cluster> = order
                .into_iter()
                .map(|key| Cluster {
                    lat: key.0 as f64 / 1000.0,
                    lon: key.1 as f64 / 1000.0,
                    count: tally[&key],
                })
                .collect();
            clusters.sort_by(|a, b| b.count.cmp(&a.count));
            clusters.truncate(INFO_TOP);
            clusters
        }
        _ => Vec::new(),
    };

    InfoOnly {
        count: rows.len(),
        top_addresses,
        top_clusters,
    }
}

fn milli(v: f64) -> i64 {
    (v * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn dataset(rows: serde_json::Value) -> Dataset {
        Dataset::from_records("test", crate::test_source::ScriptedSource::rows(rows))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_sorted_descending() {
        let ds = dataset(json!([
            {"a": "1", "b": null, "c": ""},
            {"a": "2", "b": null, "c": "x"},
        ]));
        let f = Findings::collect(&ds, now());
        let order: Vec<_> = f.missing.iter().map(|m| (m.column.as_str(), m.missing)).collect();
        assert_eq!(order, vec![("b", 2), ("c", 1), ("a", 0)]);
        assert_eq!(f.missing[0].percent, 100.0);
    }

    #[test]
    fn test_duplicates_and_temporal() {
        let ds = dataset(json!([
            {"sr_number": "SR1", "created_date": "2024-04-01T00:00:00", "closed_date": "2024-03-01T00:00:00"},
            {"sr_number": "SR1", "created_date": "2024-05-01T00:00:00", "closed_date": null},
            {"sr_number": "SR2", "created_date": "garbage", "closed_date": "2024-06-01T00:00:00"},
        ]));
        let f = Findings::collect(&ds, now());
        assert_eq!(f.sr_column.as_deref(), Some("sr_number"));
        assert_eq!(f.duplicates, Some(1));
        assert_eq!(
            f.temporal,
            TemporalCounts {
                future_created: Some(1),
                future_closed: Some(1),
                closed_before_created: Some(1),
            }
        );
    }

    #[test]
    fn test_empty_closed_column_is_not_counted() {
        let ds = dataset(json!([{"created_date": "2024-04-01", "closed_date": null}]));
        let f = Findings::collect(&ds, now());
        assert_eq!(f.temporal.future_created, Some(0));
        assert_eq!(f.temporal.future_closed, None);
        assert_eq!(f.temporal.closed_before_created, None);
    }

    #[test]
    fn test_spatial_falls_back_to_projected() {
        let ds = dataset(json!([
            {"x_coordinate": "1176000", "y_coordinate": "0"},
            {"x_coordinate": "1176000", "y_coordinate": "1900000"},
        ]));
        assert_eq!(Findings::collect(&ds, now()).coordinate_anomalies, Some(1));

        let none = dataset(json!([{"sr_number": "1"}]));
        assert_eq!(Findings::collect(&none, now()).coordinate_anomalies, None);
    }

    #[test]
    fn test_information_only_tallies() {
        let ds = dataset(json!([
            {"sr_type": "311 INFORMATION ONLY CALL", "street_address": "2111 W LEXINGTON ST", "latitude": "41.87161", "longitude": "-87.68155"},
            {"sr_type": "311 INFORMATION ONLY CALL", "street_address": "2111 W LEXINGTON ST", "latitude": "41.8718", "longitude": "-87.6817"},
            {"sr_type": "Information Only", "street_address": "100 N STATE ST", "latitude": null, "longitude": null},
            {"sr_type": "Pothole in Street", "street_address": "2111 W LEXINGTON ST", "latitude": "41.9", "longitude": "-87.7"},
        ]));
        let info = Findings::collect(&ds, now()).info_only;
        assert_eq!(info.count, 3);
        assert_eq!(
            info.top_addresses[0],
            ValueCount {
                value: "2111 W LEXINGTON ST".into(),
                count: 2
            }
        );
        assert_eq!(info.top_clusters.len(), 1);
        assert_eq!(info.top_clusters[0].count, 2);
        assert_eq!(info.top_clusters[0].lat, 41.872);
    }

    #[test]
    fn test_value_counts_keep_missing() {
        let values = [json!(false), json!(null), json!(false), json!(true)];
        let counts = value_counts(values.iter(), true);
        assert_eq!(counts[0], ValueCount { value: "false".into(), count: 2 });
        assert_eq!(counts.len(), 3);
        assert_eq!(value_counts(values.iter(), false).len(), 2);
    }
}
