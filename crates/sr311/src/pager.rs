//! Pagination over the remote source
//!
//! Two modes. With a negotiated filter the source does the date filtering
//! and paging runs until a short page. Without one, pages are fetched blind
//! and screened locally against the cutoff, with stop conditions bounding
//! how much history gets read.

use crate::client::{PageQuery, SourceClient};
use crate::dates;
use crate::error::Result;
use crate::models::{FetchWindow, Page, Record};
use crate::negotiate::ServerFilter;
use diagnostics::*;

/// Why pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned a short or empty page
    Exhausted,
    /// A page with nothing recent followed pages that contributed rows
    PassedWindow,
    /// The configured page budget was spent
    PageCap,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StopReason::Exhausted => "source exhausted",
            StopReason::PassedWindow => "passed the window",
            StopReason::PageCap => "page cap reached",
        })
    }
}

/// Rows kept by a pager plus the size of every page it received
#[derive(Debug, Default)]
pub struct Paged {
    pub records: Vec<Record>,
    pub page_sizes: Vec<usize>,
    pub stop: Option<StopReason>,
}

impl Paged {
    pub fn pages_scanned(&self) -> usize {
        self.page_sizes.len()
    }
}

/// Page through everything `filter` matches.
///
/// `first_rows` is the probe page returned during negotiation; paging resumes
/// right after it. No page cap: the filter already bounds the result set.
pub fn page_filtered(
    client: &dyn SourceClient,
    filter: &ServerFilter,
    first_rows: Page,
    chunk_size: usize,
) -> Result<Paged> {
    let mut paged = Paged::default();
    let mut offset = first_rows.len();
    paged.page_sizes.push(first_rows.len());
    paged.records.extend(first_rows);

    loop {
        let query = PageQuery::new(chunk_size)
            .offset(offset)
            .filter(Some(&filter.filter))
            .order(Some(&filter.order));
        let page = client.fetch_page(&query)?;

        let rows = page.len();
        debug!("Filtered page at offset {offset}: {rows} rows");
        paged.page_sizes.push(rows);
        paged.records.extend(page);
        offset += rows;

        if rows < chunk_size {
            break;
        }
    }

    let total = paged.records.len();
    let pages = paged.pages_scanned();
    info!("Server-filtered paging finished: {total} rows in {pages} pages");
    paged.stop = Some(StopReason::Exhausted);
    Ok(paged)
}

/// Local verdict on one blind page
#[derive(Debug, Default)]
pub struct PageScreen {
    pub kept: Page,
    /// Some row parsed to an instant at or after the cutoff
    pub any_newer: bool,
    /// Some row parsed in at least one date column
    pub any_dated: bool,
}

/// Keep rows with any date column at or after the cutoff.
///
/// A page where no candidate column parses on any row is kept whole: there
/// is no way to tell how old it is. The keep-whole rule applies per page, so
/// on a page with some parseable dates an undated row is dropped.
pub fn screen_page(page: Page, date_columns: &[String], window: &FetchWindow) -> PageScreen {
    let mut screen = PageScreen::default();
    let mut newer = Vec::with_capacity(page.len());

    for row in &page {
        let mut row_newer = false;
        for column in date_columns {
            if let Some(instant) = row.get(column).and_then(dates::parse_value) {
                screen.any_dated = true;
                row_newer |= window.admits(instant);
            }
        }
        newer.push(row_newer);
    }
    screen.any_newer = newer.iter().any(|n| *n);

    screen.kept = if screen.any_dated {
        page.into_iter()
            .zip(newer)
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect()
    } else {
        page
    };
    screen
}

/// Progress of a blind scan, as seen by stop conditions after each page
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanProgress {
    pub pages_scanned: usize,
    /// Pages before the one just screened that contributed kept rows
    pub earlier_pages_kept: usize,
    /// The page just screened had a row at or after the cutoff
    pub last_page_newer: bool,
}

/// A reason to end a blind scan early
pub trait StopCondition {
    fn check(&self, progress: &ScanProgress) -> Option<StopReason>;
}

/// Nothing recent on this page, but earlier pages contributed rows: the scan
/// has moved past the window into older history. An undated page has nothing
/// recent either.
#[derive(Debug, Default)]
pub struct PassedWindow;

impl StopCondition for PassedWindow {
    fn check(&self, progress: &ScanProgress) -> Option<StopReason> {
        (!progress.last_page_newer && progress.earlier_pages_kept > 0)
            .then_some(StopReason::PassedWindow)
    }
}

/// Hard budget on pages scanned
#[derive(Debug)]
pub struct PageCap(pub usize);

impl StopCondition for PageCap {
    fn check(&self, progress: &ScanProgress) -> Option<StopReason> {
        (progress.pages_scanned >= self.0).then_some(StopReason::PageCap)
    }
}

/// Settings for a blind scan
#[derive(Debug, Clone)]
pub struct BlindScan<'a> {
    pub date_columns: &'a [String],
    pub order: Option<&'a str>,
    pub chunk_size: usize,
    pub max_pages: usize,
}

/// Page without a server-side filter, screening each page locally
pub fn page_blind(
    client: &dyn SourceClient,
    scan: &BlindScan<'_>,
    window: &FetchWindow,
) -> Result<Paged> {
    let conditions: [&dyn StopCondition; 2] = [&PassedWindow, &PageCap(scan.max_pages)];
    let mut paged = Paged::default();
    let mut progress = ScanProgress::default();
    let mut offset = 0;

    let stop = loop {
        let query = PageQuery::new(scan.chunk_size)
            .offset(offset)
            .order(scan.order);
        let page = client.fetch_page(&query)?;

        let rows = page.len();
        if rows == 0 {
            break StopReason::Exhausted;
        }
        offset += rows;
        paged.page_sizes.push(rows);

        let screen = screen_page(page, scan.date_columns, window);
        let kept = screen.kept.len();
        let page_number = progress.pages_scanned + 1;
        if !screen.any_dated {
            warn!("Page {page_number} has no parseable dates; keeping all {rows} rows");
        }
        debug!("Blind page {page_number}: kept {kept} of {rows} rows");

        progress.pages_scanned += 1;
        progress.last_page_newer = screen.any_newer;
        paged.records.extend(screen.kept);

        if let Some(reason) = conditions.iter().find_map(|c| c.check(&progress)) {
            break reason;
        }
        if kept > 0 {
            progress.earlier_pages_kept += 1;
        }
        if rows < scan.chunk_size {
            break StopReason::Exhausted;
        }
    };

    let total = paged.records.len();
    let pages = progress.pages_scanned;
    let reason = stop.to_string();
    info!("Blind paging stopped ({reason}) after {pages} pages with {total} rows kept");
    paged.stop = Some(stop);
    Ok(paged)
}
