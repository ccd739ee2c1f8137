use anyhow::Result;
use chrono::{TimeZone, Utc};
use sr311::columns::DATE_FIELD_CANDIDATES;
use sr311::models::Record;
use sr311::negotiate::{Comparison, FailureKind};
use sr311::report::{IngestSummary, Reporter};
use sr311::{Client, Error, FetchMode, FetchOptions, FetchOutcome, FetchWindow, Fetcher, StopReason};

use mock_server::{Fixture, MockSocrataServer, Outage};

const CUTOFF: &str = "2024-01-15T00:00:00Z";

/// 90 days back from 2024-04-14T00:00:00Z
fn window() -> FetchWindow {
    FetchWindow::ending_at(Utc.with_ymd_and_hms(2024, 4, 14, 0, 0, 0).unwrap(), 90).unwrap()
}

fn options(chunk_size: usize, max_pages: usize) -> FetchOptions {
    FetchOptions {
        chunk_size,
        max_pages,
        ..Default::default()
    }
}

fn fetch(server: &MockSocrataServer, options: &FetchOptions) -> sr311::Result<FetchOutcome> {
    let client = Client::new(&server.endpoint(), None)?;
    Fetcher::new(&client).fetch_within(window(), options)
}

fn sr_numbers(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["sr_number"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// A true timestamp column accepts the raw comparison on the first try
#[test]
fn test_timestamp_column_filters_server_side() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("timestamp_requests.json")?)?;
    let outcome = fetch(&server, &options(2, 30))?;

    let FetchMode::ServerFiltered(filter) = &outcome.mode else {
        panic!("expected server filtering, got {:?}", outcome.mode);
    };
    assert_eq!(filter.column, "requested_datetime");
    assert_eq!(filter.comparison, Comparison::Raw);
    assert!(outcome.rejected.is_empty());

    assert_eq!(
        sr_numbers(&outcome.records),
        vec!["SR24-00077391", "SR24-00198345", "SR24-00412907", "SR24-00530012", "SR24-00611874"]
    );
    assert_eq!(outcome.page_sizes, vec![2, 2, 1]);
    assert_eq!(outcome.records.len(), outcome.page_sizes.iter().sum::<usize>());
    assert_eq!(outcome.stop, StopReason::Exhausted);

    let filtered = server.filtered_requests();
    let expected_where = format!("requested_datetime >= '{CUTOFF}'");
    assert!(filtered.iter().all(|r| r.param("$where") == Some(expected_where.as_str())));
    assert!(filtered.iter().all(|r| r.param("$order") == Some("requested_datetime")));
    assert_eq!(filtered[0].param("$limit"), Some("2"));
    Ok(())
}

/// Free-text dates are rejected raw and accepted with the cast
#[test]
fn test_text_column_negotiates_cast() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("text_created_date.json")?)?;
    let outcome = fetch(&server, &FetchOptions::default())?;

    let FetchMode::ServerFiltered(filter) = &outcome.mode else {
        panic!("expected server filtering, got {:?}", outcome.mode);
    };
    assert_eq!(filter.column, "created_date");
    assert_eq!(filter.comparison, Comparison::Cast);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].status, 400);
    assert_eq!(outcome.rejected[0].kind, FailureKind::TypeMismatch);

    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.page_sizes, vec![4, 0]);

    let filtered = server.filtered_requests();
    assert_eq!(filtered.len(), 3);
    assert_eq!(
        filtered[0].param("$where"),
        Some(format!("created_date >= '{CUTOFF}'").as_str())
    );
    assert_eq!(filtered[0].param("$limit"), Some("5"));
    for request in &filtered[1..] {
        assert_eq!(
            request.param("$where"),
            Some(format!("created_date::floating_timestamp >= '{CUTOFF}'").as_str())
        );
        assert_eq!(request.param("$order"), Some("created_date::floating_timestamp"));
    }
    Ok(())
}

/// No candidate in the schema is fatal after the schema probe alone
#[test]
fn test_no_date_column_is_fatal() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("no_date_columns.json")?)?;
    let err = fetch(&server, &FetchOptions::default()).unwrap_err();

    match &err {
        Error::NoDateColumn { candidates, schema } => {
            assert_eq!(candidates.len(), DATE_FIELD_CANDIDATES.len());
            assert_eq!(schema, &vec!["addr", "request_kind", "sr_num", "state", "ward"]);
        }
        other => panic!("expected NoDateColumn, got {other:?}"),
    }
    let message = err.to_string();
    for candidate in DATE_FIELD_CANDIDATES {
        assert!(message.contains(candidate), "{message}");
    }

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("$limit"), Some("1"));
    Ok(())
}

#[test]
fn test_override_must_be_in_schema() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("timestamp_requests.json")?)?;
    let options = FetchOptions {
        created_field: Some("created_date".into()),
        ..Default::default()
    };
    let err = fetch(&server, &options).unwrap_err();

    assert!(matches!(err, Error::OverrideNotInSchema { ref column, .. } if column == "created_date"));
    assert!(server.filtered_requests().is_empty());
    Ok(())
}

/// A column the source can neither compare nor cast falls back to blind paging
#[test]
fn test_uncastable_column_pages_blind() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("opaque_open_date.json")?)?;
    let outcome = fetch(&server, &options(3, 2))?;

    assert_eq!(
        outcome.mode,
        FetchMode::Blind {
            date_columns: vec!["open_date".into()],
            order: Some("open_date".into()),
        }
    );
    assert_eq!(outcome.rejected.len(), 2);
    assert_eq!(outcome.stop, StopReason::PageCap);
    assert_eq!(outcome.page_sizes, vec![3, 3]);

    assert_eq!(
        sr_numbers(&outcome.records),
        vec!["SR24-00050400", "SR24-00150700", "SR24-00300100", "SR24-00420600"]
    );
    let cutoff = window().cutoff();
    for record in &outcome.records {
        let opened = sr311::dates::parse_value(&record["open_date"]).unwrap();
        assert!(opened >= cutoff);
    }

    let blind: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.param("$where").is_none() && r.param("$offset").is_some())
        .collect();
    assert_eq!(blind.len(), 2);
    assert_eq!(blind[1].param("$offset"), Some("3"));
    Ok(())
}

/// A blind page with no parseable date anywhere is kept whole
#[test]
fn test_undated_page_is_kept() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("undated_open_date.json")?)?;
    let outcome = fetch(&server, &FetchOptions::default())?;

    assert!(matches!(outcome.mode, FetchMode::Blind { .. }));
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.stop, StopReason::Exhausted);
    Ok(())
}

#[test]
fn test_transport_failure_aborts_fetch() -> Result<()> {
    let mut fixture = Fixture::load("timestamp_requests.json")?;
    fixture.outage = Some(Outage {
        status: 503,
        from_offset: 2,
    });
    let server = MockSocrataServer::start(fixture)?;
    let err = fetch(&server, &options(2, 30)).unwrap_err();

    match &err {
        Error::Transport { status, url, body } => {
            assert_eq!(*status, 503);
            assert!(url.contains("offset=2"), "{url}");
            assert!(body.contains("Service Unavailable"));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert!(err.to_string().starts_with("HTTP 503 from Socrata."));
    // Nothing after the failing page is attempted
    assert_eq!(server.requests().len(), 3);
    Ok(())
}

#[test]
fn test_app_token_header_is_sent() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("text_created_date.json")?)?;
    let client = Client::new(&server.endpoint(), Some("test-token".into()))?;
    Fetcher::new(&client).fetch_within(window(), &FetchOptions::default())?;

    let requests = server.requests();
    assert!(!requests.is_empty());
    assert!(requests.iter().all(|r| r.app_token.as_deref() == Some("test-token")));
    Ok(())
}

#[test]
fn test_repeated_fetches_are_identical() -> Result<()> {
    for fixture in ["timestamp_requests.json", "opaque_open_date.json"] {
        let server = MockSocrataServer::start(Fixture::load(fixture)?)?;
        let first = fetch(&server, &options(2, 30))?;
        let second = fetch(&server, &options(2, 30))?;
        assert_eq!(first.records, second.records, "{fixture}");
        assert_eq!(first.page_sizes, second.page_sizes, "{fixture}");
    }
    Ok(())
}

#[test]
fn test_fetch_to_snapshot_and_summary() -> Result<()> {
    let server = MockSocrataServer::start(Fixture::load("timestamp_requests.json")?)?;
    let mut outcome = fetch(&server, &options(2, 30))?;
    let dataset = outcome.take_dataset("API (last 90 days)");
    assert_eq!(dataset.len(), 5);

    let dir = tempfile::tempdir()?;
    let parquet = dir.path().join("data/raw_311.parquet");
    sr311::snapshot::write_parquet(&dataset, &parquet)?;
    assert!(parquet.metadata()?.len() > 0);

    let summary = Reporter::new()?.ingest_summary(&IngestSummary::new(&dataset, Some(&outcome)))?;
    assert!(summary.contains("- Source: **API (last 90 days)**"));
    assert!(summary.contains("- Rows: **5**"));
    assert!(summary.contains(
        "- Date range: **2024-01-15 00:00:00+00:00 → 2024-04-10 17:45:00+00:00**"
    ));
    assert!(summary.contains(&format!("- Filter: `requested_datetime >= '{CUTOFF}'`")));
    assert!(summary.contains("- Pages: **3**, stopped: source exhausted"));
    Ok(())
}
