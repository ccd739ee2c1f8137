//! Server-side date filter negotiation
//!
//! For each candidate column, in priority order, the negotiator tries a
//! plain `>=` comparison and then, when the rejection looks like a type
//! problem, the same comparison on `column::floating_timestamp`. The first
//! probe the source accepts wins. Running out of candidates is an outcome,
//! not an error: the caller switches to blind pagination.

use crate::client::{PageQuery, SourceClient};
use crate::columns::DATE_FIELD_CANDIDATES;
use crate::error::{Error, Result};
use crate::models::{FetchWindow, Page};
use crate::probe::SchemaSnapshot;
use diagnostics::*;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Rows requested by a filter probe
pub const PROBE_PAGE_ROWS: usize = 5;

/// SoQL cast applied to text columns
pub const TIMESTAMP_CAST: &str = "floating_timestamp";

static TYPE_MISMATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)type[\s_-]*mismatch|op\$\s*>=|cannot\s+(?:be\s+)?compared?|incompatible\s+types?|no\s+(?:such\s+)?(?:function|operator)|invalid\s+(?:comparison|operator)|not\s+comparable",
    )
    .expect("type mismatch pattern")
});

static NO_SUCH_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)no[\s_-]*such[\s_-]*column|unknown[\s_-]+column|column\s+\S+\s+(?:does\s+not\s+exist|not\s+found)",
    )
    .expect("no such column pattern")
});

/// How a candidate column is compared against the cutoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `column >= 'cutoff'`
    Raw,
    /// `column::floating_timestamp >= 'cutoff'`
    Cast,
}

impl Comparison {
    /// Column expression used for both `$where` and `$order`
    pub fn column_expr(self, column: &str) -> String {
        match self {
            Comparison::Raw => column.to_string(),
            Comparison::Cast => format!("{column}::{TIMESTAMP_CAST}"),
        }
    }

    pub fn filter_expr(self, column: &str, window: &FetchWindow) -> String {
        let literal = window.cutoff_literal();
        format!("{} >= '{literal}'", self.column_expr(column))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Raw => write!(f, "raw"),
            Comparison::Cast => write!(f, "cast"),
        }
    }
}

/// A filter the source accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFilter {
    pub column: String,
    pub comparison: Comparison,
    pub filter: String,
    pub order: String,
}

impl ServerFilter {
    fn new(column: &str, comparison: Comparison, window: &FetchWindow) -> Self {
        Self {
            column: column.to_string(),
            comparison,
            filter: comparison.filter_expr(column, window),
            order: comparison.column_expr(column),
        }
    }
}

/// Why the source rejected a filter probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The column's stored type does not support the comparison
    TypeMismatch,
    /// The source does not know the column
    NoSuchColumn,
    /// Neither of the above could be recognized in the response
    Unclassified,
}

impl FailureKind {
    /// Whether the cast form is worth a try after a raw rejection.
    ///
    /// Unclassified responses get the cast attempt too; only a clear
    /// non-type failure skips straight to the next candidate.
    pub fn warrants_cast(self) -> bool {
        matches!(self, FailureKind::TypeMismatch | FailureKind::Unclassified)
    }
}

/// Classify a rejected probe from its status and body.
///
/// The structured Socrata `code` is consulted first; the free-text message
/// is matched against broad pattern sets after that.
pub fn classify_rejection(body: &str) -> FailureKind {
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(body) {
        let code = ["code", "errorCode", "error_code"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(|v| v.as_str()))
            .unwrap_or_default()
            .to_ascii_lowercase();
        if code.contains("type-mismatch") || code.contains("type_mismatch") {
            return FailureKind::TypeMismatch;
        }
        if code.contains("no-such-column") || code.contains("no_such_column") {
            return FailureKind::NoSuchColumn;
        }
    }

    if TYPE_MISMATCH.is_match(body) {
        FailureKind::TypeMismatch
    } else if NO_SUCH_COLUMN.is_match(body) {
        FailureKind::NoSuchColumn
    } else {
        FailureKind::Unclassified
    }
}

/// A rejected probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub column: String,
    pub comparison: Comparison,
    pub status: u16,
    pub kind: FailureKind,
}

/// Result of negotiation
#[derive(Debug)]
pub enum Negotiation {
    /// The source accepted `filter`; `first_rows` is the probe page
    Accepted {
        filter: ServerFilter,
        first_rows: Page,
        rejected: Vec<Attempt>,
    },
    /// No candidate could be filtered server-side
    Exhausted { rejected: Vec<Attempt> },
}

/// Columns to negotiate over, in priority order.
///
/// An explicit override must exist in the schema. Without one, at least one
/// known date candidate must. Both failures are fatal.
pub fn candidate_columns(
    schema: &SchemaSnapshot,
    override_column: Option<&str>,
) -> Result<Vec<String>> {
    if let Some(column) = override_column {
        if !schema.contains(column) {
            return Err(Error::OverrideNotInSchema {
                column: column.to_string(),
                schema: schema.sorted(),
            });
        }
        return Ok(vec![column.to_string()]);
    }

    let present: Vec<String> = DATE_FIELD_CANDIDATES
        .iter()
        .filter(|c| schema.contains(c))
        .map(|c| c.to_string())
        .collect();

    if present.is_empty() {
        return Err(Error::NoDateColumn {
            candidates: DATE_FIELD_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            schema: schema.sorted(),
        });
    }
    Ok(present)
}

/// Find the first candidate the source accepts in a `>=` filter.
///
/// Rejections (non-success statuses) are recorded and skipped. Failures that
/// never reached the source, such as timeouts, end the fetch.
pub fn negotiate(
    client: &dyn SourceClient,
    candidates: &[String],
    window: &FetchWindow,
    chunk_size: usize,
) -> Result<Negotiation> {
    let probe_rows = PROBE_PAGE_ROWS.min(chunk_size).max(1);
    let mut rejected = Vec::new();

    for column in candidates {
        for comparison in [Comparison::Raw, Comparison::Cast] {
            let filter = ServerFilter::new(column, comparison, window);
            let query = PageQuery::new(probe_rows)
                .filter(Some(&filter.filter))
                .order(Some(&filter.order));

            match client.fetch_page(&query) {
                Ok(first_rows) => {
                    let expr = filter.filter.clone();
                    info!("Negotiated server-side filter: {expr}");
                    return Ok(Negotiation::Accepted {
                        filter,
                        first_rows,
                        rejected,
                    });
                }
                Err(Error::Transport { status, body, .. }) => {
                    let kind = classify_rejection(&body);
                    let kind_name = format!("{kind:?}");
                    let mode = comparison.to_string();
                    debug!("Probe on {column} ({mode}) rejected with HTTP {status}: {kind_name}");
                    if kind == FailureKind::Unclassified {
                        warn!("Unrecognized rejection for {column} ({mode}), HTTP {status}: {body}");
                    }
                    rejected.push(Attempt {
                        column: column.clone(),
                        comparison,
                        status,
                        kind,
                    });
                    if comparison == Comparison::Raw && !kind.warrants_cast() {
                        break;
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    let attempts = rejected.len();
    warn!("No server-side date filter accepted after {attempts} probes");
    Ok(Negotiation::Exhausted { rejected })
}
