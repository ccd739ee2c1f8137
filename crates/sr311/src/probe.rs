use crate::client::{PageQuery, SourceClient};
use crate::error::Result;
use diagnostics::*;
use std::collections::BTreeSet;

/// Column names seen in one probe row.
///
/// Socrata omits null fields from JSON rows, so this is a lower bound on the
/// real schema. It is fixed for the rest of the fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    columns: BTreeSet<String>,
}

impl SchemaSnapshot {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Sorted column names, for diagnostics
    pub fn sorted(&self) -> Vec<String> {
        self.columns.iter().cloned().collect()
    }
}

/// Request a single row and report the field names it carries.
///
/// An empty dataset yields an empty snapshot; a non-success status is fatal.
pub fn probe_schema(client: &dyn SourceClient) -> Result<SchemaSnapshot> {
    let rows = client.fetch_page(&PageQuery::schema_probe())?;
    let snapshot = rows
        .first()
        .map(|row| SchemaSnapshot::new(row.keys().cloned()))
        .unwrap_or_default();

    let column_count = snapshot.columns.len();
    if snapshot.is_empty() {
        warn!("Schema probe returned no columns; the dataset may be empty");
    } else {
        debug!("Schema probe found {column_count} columns");
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestKind;
    use crate::error::Error;
    use crate::test_source::ScriptedSource;
    use serde_json::json;

    #[test]
    fn test_probe_reads_first_row_keys() {
        let source = ScriptedSource::new(|query| {
            assert_eq!(query.kind, RequestKind::Schema);
            assert_eq!(query.limit, 1);
            Ok(ScriptedSource::rows(json!([{"sr_number": "SR1", "created_date": "x"}])))
        });

        let schema = probe_schema(&source).unwrap();
        assert_eq!(schema.sorted(), vec!["created_date", "sr_number"]);
        assert_eq!(source.request_count(), 1);
    }

    #[test]
    fn test_probe_of_empty_dataset() {
        let source = ScriptedSource::new(|_| Ok(Vec::new()));
        let schema = probe_schema(&source).unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_probe_transport_error_is_fatal() {
        let source = ScriptedSource::new(|_| Err(Error::transport(403, "http://x", "forbidden")));
        assert!(matches!(
            probe_schema(&source),
            Err(Error::Transport { status: 403, .. })
        ));
    }
}
