use crate::error::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// One service request row exactly as the source returned it
pub type Record = Map<String, Value>;

/// Rows returned by one remote request, in remote order
pub type Page = Vec<Record>;

/// Cutoff instant for one fetch: `now - days`.
///
/// Computed once; every server-side and client-side comparison in the
/// fetch uses the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    cutoff: DateTime<Utc>,
}

impl FetchWindow {
    /// Window ending at the current wall-clock time
    pub fn from_now(days_back: u32) -> Result<Self> {
        Self::ending_at(Utc::now(), days_back)
    }

    /// Window ending at `now`; fails when the cutoff falls outside the
    /// representable calendar
    pub fn ending_at(now: DateTime<Utc>, days_back: u32) -> Result<Self> {
        let cutoff = Duration::try_days(i64::from(days_back))
            .and_then(|back| now.checked_sub_signed(back))
            .ok_or_else(|| Error::config(format!("days back out of range: {days_back}")))?;
        // SoQL literals carry second precision
        let cutoff = DateTime::from_timestamp(cutoff.timestamp(), 0).unwrap_or(cutoff);
        Ok(Self { cutoff })
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Cutoff as a SoQL literal body, e.g. `2024-01-15T00:00:00Z`
    pub fn cutoff_literal(&self) -> String {
        self.cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// True when `instant` is at or after the cutoff
    pub fn admits(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.cutoff
    }
}

/// A loaded record set with its column order and a label describing its origin
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub source_label: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    /// Build from records, taking columns in first-appearance order
    pub fn from_records(source_label: impl Into<String>, records: Vec<Record>) -> Self {
        let columns = column_order(&records);
        Self {
            source_label: source_label.into(),
            columns,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of one column, with `Value::Null` for rows that lack it
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records
            .iter()
            .map(move |r| r.get(name).unwrap_or(&Value::Null))
    }
}

/// Union of record keys in the order they first appear
pub fn column_order(records: &[Record]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// True for JSON null and for empty or whitespace-only strings
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Render a scalar for reports and snapshots; `None` for missing values
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

/// Numeric view of a value, as a spreadsheet would coerce it
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_window_cutoff_literal() {
        let now = Utc.with_ymd_and_hms(2024, 4, 14, 12, 30, 15).unwrap();
        let window = FetchWindow::ending_at(now, 90).unwrap();
        assert_eq!(window.cutoff_literal(), "2024-01-15T12:30:15Z");
        assert!(window.admits(window.cutoff()));
        assert!(!window.admits(window.cutoff() - Duration::seconds(1)));
    }

    #[test]
    fn test_window_drops_subsecond_precision() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_750).unwrap();
        let window = FetchWindow::ending_at(now, 0).unwrap();
        assert_eq!(window.cutoff().timestamp_subsec_millis(), 0);
    }

    #[test]
    fn test_window_out_of_range_is_an_error() {
        let now = Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap();
        let err = FetchWindow::ending_at(now, u32::MAX).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("days back out of range"));
        assert!(FetchWindow::from_now(u32::MAX).is_err());
    }

    #[test]
    fn test_column_order_is_first_appearance() {
        let records: Vec<Record> = vec![
            json!({"b": 1, "a": 2}).as_object().unwrap().clone(),
            json!({"a": 3, "c": null}).as_object().unwrap().clone(),
        ];
        assert_eq!(column_order(&records), vec!["b", "a", "c"]);

        let ds = Dataset::from_records("test", records);
        let cs: Vec<_> = ds.column_values("c").collect();
        assert_eq!(cs, vec![&Value::Null, &Value::Null]);
    }

    #[test]
    fn test_value_helpers() {
        assert!(is_missing(&json!(null)));
        assert!(is_missing(&json!("  ")));
        assert!(!is_missing(&json!(0)));
        assert_eq!(value_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(value_number(&json!("41.88")), Some(41.88));
        assert_eq!(value_number(&json!("n/a")), None);
    }
}
