//! Result pagination store.
//!
//! Holds the accumulated rows of the current query and the cursor used to ask
//! the engine for the next page. The store is the only owner of the row
//! sequence; the grid reads it, nothing else writes it.
//!
//! Loading more is split into `begin_load_more` / `finish_load_more` so a UI
//! host can spawn the engine future in between. `load_more` does both for
//! callers that can simply await.

use quarry_core::{EngineError, PageRequest, PaginationError, QueryEngine, QueryResult, ShapeError};

// =============================================================================
// Pagination Cursor
// =============================================================================

/// Position of the store within the current query's output.
///
/// `offset` always equals the number of rows held for `last_query_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    /// Query the held rows belong to. Empty when nothing can be paged.
    pub last_query_text: String,

    /// Rows held so far.
    pub offset: usize,

    /// Rows requested per page.
    pub page_size: usize,

    /// Heuristic: the last page was full, so more rows may exist.
    ///
    /// A query whose row count is an exact multiple of the page size offers
    /// one extra, empty page.
    pub has_more: bool,
}

impl PaginationCursor {
    /// Create a cursor for the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            last_query_text: String::new(),
            offset: 0,
            page_size: page_size.max(1),
            has_more: true,
        }
    }

    fn reset(&mut self) {
        self.last_query_text.clear();
        self.offset = 0;
        self.has_more = true;
    }

    fn is_full_page(&self, returned: usize) -> bool {
        returned >= self.page_size
    }
}

// =============================================================================
// Load More Protocol
// =============================================================================

/// Why a load-more request was not issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMoreSkip {
    /// The last page was short.
    NoMoreRows,
    /// A page is already in flight.
    AlreadyLoading,
    /// No query has produced pageable rows.
    NoQuery,
    /// The first page holds no rows.
    NoFirstPage,
}

/// An in-flight load-more request.
#[derive(Debug, Clone)]
pub struct LoadMoreTicket {
    generation: u64,
    request: PageRequest,
}

impl LoadMoreTicket {
    /// The page request to send to the engine.
    pub fn request(&self) -> &PageRequest {
        &self.request
    }
}

/// What happened to a load-more attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadMoreOutcome {
    /// Preconditions failed; nothing was requested.
    Skipped(LoadMoreSkip),
    /// Rows were appended.
    Appended { rows: usize },
    /// The engine failed; loaded rows are kept and paging stops.
    Failed(PaginationError),
    /// The store was reset while the page was in flight; the page was dropped.
    Stale,
}

// =============================================================================
// Result Store
// =============================================================================

/// Accumulated result of the current query.
#[derive(Debug)]
pub struct ResultStore {
    result: QueryResult,
    cursor: PaginationCursor,
    loading_more: bool,
    /// Bumped whenever the row sequence is replaced. Appends keep it.
    generation: u64,
    last_error: Option<PaginationError>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new(page_size: usize) -> Self {
        Self {
            result: QueryResult::default(),
            cursor: PaginationCursor::new(page_size),
            loading_more: false,
            generation: 0,
            last_error: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn header(&self) -> &[String] {
        &self.result.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.result.rows
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.result.rows.get(index).map(Vec::as_slice)
    }

    pub fn row_count(&self) -> usize {
        self.result.rows.len()
    }

    pub fn query_time(&self) -> &str {
        &self.result.query_time
    }

    pub fn has_header(&self) -> bool {
        !self.result.header.is_empty()
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.cursor.page_size
    }

    pub fn has_more(&self) -> bool {
        self.cursor.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn last_query_text(&self) -> &str {
        &self.cursor.last_query_text
    }

    /// Changes whenever the row sequence is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The most recent load-more failure, if paging stopped because of one.
    pub fn last_error(&self) -> Option<&PaginationError> {
        self.last_error.as_ref()
    }

    // -------------------------------------------------------------------------
    // Replacement
    // -------------------------------------------------------------------------

    /// Clear the result and rewind the cursor.
    pub fn reset(&mut self) {
        self.result = QueryResult::default();
        self.cursor.reset();
        self.loading_more = false;
        self.last_error = None;
        self.generation += 1;
    }

    /// Install the first page of `query_text`.
    pub fn set_first_page(
        &mut self,
        query_text: impl Into<String>,
        result: QueryResult,
    ) -> Result<(), ShapeError> {
        result.validate()?;

        let returned = result.rows.len();
        self.cursor.last_query_text = query_text.into();
        self.cursor.offset = returned;
        self.cursor.has_more = self.cursor.is_full_page(returned);
        self.result = result;
        self.loading_more = false;
        self.last_error = None;
        self.generation += 1;

        tracing::debug!(
            rows = returned,
            has_more = self.cursor.has_more,
            "First page stored"
        );
        Ok(())
    }

    /// Install a synthetic result (error or cancellation). It cannot be paged.
    pub fn show_synthetic(&mut self, result: QueryResult) {
        self.cursor.last_query_text.clear();
        self.cursor.offset = result.rows.len();
        self.cursor.has_more = false;
        self.result = result;
        self.loading_more = false;
        self.last_error = None;
        self.generation += 1;
    }

    // -------------------------------------------------------------------------
    // Load More
    // -------------------------------------------------------------------------

    /// Check preconditions and mark a page as in flight.
    pub fn begin_load_more(&mut self) -> Result<LoadMoreTicket, LoadMoreSkip> {
        if !self.cursor.has_more {
            return Err(LoadMoreSkip::NoMoreRows);
        }
        if self.loading_more {
            return Err(LoadMoreSkip::AlreadyLoading);
        }
        if self.cursor.last_query_text.trim().is_empty() {
            return Err(LoadMoreSkip::NoQuery);
        }
        if self.result.rows.is_empty() {
            return Err(LoadMoreSkip::NoFirstPage);
        }

        self.loading_more = true;
        let request = PageRequest::at(
            self.cursor.last_query_text.clone(),
            self.result.rows.len(),
            self.cursor.page_size,
        );
        tracing::debug!(offset = request.offset, "Loading more rows");

        Ok(LoadMoreTicket {
            generation: self.generation,
            request,
        })
    }

    /// Apply the engine's answer to an in-flight page.
    pub fn finish_load_more(
        &mut self,
        ticket: LoadMoreTicket,
        outcome: Result<QueryResult, EngineError>,
    ) -> LoadMoreOutcome {
        if ticket.generation != self.generation || !self.loading_more {
            tracing::debug!(offset = ticket.request.offset, "Dropping stale page");
            return LoadMoreOutcome::Stale;
        }
        self.loading_more = false;

        let offset = ticket.request.offset;
        let page = match outcome.and_then(|page| {
            self.result.validate_rows(&page.rows)?;
            Ok(page)
        }) {
            Ok(page) => page,
            Err(source) => {
                let error = PaginationError { offset, source };
                tracing::warn!("{}", error);
                self.cursor.has_more = false;
                self.last_error = Some(error.clone());
                return LoadMoreOutcome::Failed(error);
            }
        };

        if !page.header.is_empty() && page.header != self.result.header {
            tracing::debug!(
                expected = ?self.result.header,
                found = ?page.header,
                "Page header differs from first page"
            );
        }

        let returned = page.rows.len();
        self.result.rows.extend(page.rows);
        self.cursor.offset += returned;
        self.cursor.has_more = self.cursor.is_full_page(returned);

        tracing::debug!(
            appended = returned,
            total = self.result.rows.len(),
            has_more = self.cursor.has_more,
            "Page appended"
        );
        LoadMoreOutcome::Appended { rows: returned }
    }

    /// Request and append the next page.
    pub async fn load_more(&mut self, engine: &dyn QueryEngine) -> LoadMoreOutcome {
        let ticket = match self.begin_load_more() {
            Ok(ticket) => ticket,
            Err(skip) => return LoadMoreOutcome::Skipped(skip),
        };
        let outcome = engine.fetch_more(ticket.request().clone()).await;
        self.finish_load_more(ticket, outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    const QUERY: &str = "SELECT * FROM t";

    fn page(range: std::ops::Range<usize>) -> QueryResult {
        QueryResult {
            header: vec!["id".to_string(), "name".to_string()],
            rows: range.map(MockEngine::row).collect(),
            query_time: "1ms".to_string(),
        }
    }

    fn store_with_first_page(rows: usize) -> ResultStore {
        let mut store = ResultStore::new(200);
        store.set_first_page(QUERY, page(0..rows)).unwrap();
        store
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ResultStore::new(200);
        assert_eq!(store.row_count(), 0);
        assert!(!store.has_header());
        assert!(store.has_more());
        assert_eq!(store.cursor().offset, 0);
    }

    #[test]
    fn test_first_page_short_has_no_more() {
        let store = store_with_first_page(1);
        assert_eq!(store.row_count(), 1);
        assert_eq!(store.cursor().offset, 1);
        assert!(!store.has_more());
        assert_eq!(store.last_query_text(), QUERY);
    }

    #[test]
    fn test_first_page_full_has_more() {
        let store = store_with_first_page(200);
        assert!(store.has_more());
        assert_eq!(store.cursor().offset, 200);
    }

    #[test]
    fn test_first_page_rejects_ragged_rows() {
        let mut store = ResultStore::new(200);
        let mut bad = page(0..2);
        bad.rows[1].pop();

        assert!(store.set_first_page(QUERY, bad).is_err());
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_reset_clears_and_bumps_generation() {
        let mut store = store_with_first_page(200);
        let generation = store.generation();

        store.reset();
        assert_eq!(store.row_count(), 0);
        assert!(!store.has_header());
        assert_eq!(store.cursor().offset, 0);
        assert!(store.has_more());
        assert!(store.last_query_text().is_empty());
        assert!(store.generation() > generation);
    }

    #[test]
    fn test_begin_load_more_preconditions() {
        let mut empty = ResultStore::new(200);
        assert_eq!(empty.begin_load_more().unwrap_err(), LoadMoreSkip::NoQuery);

        let mut short = store_with_first_page(3);
        assert_eq!(short.begin_load_more().unwrap_err(), LoadMoreSkip::NoMoreRows);

        let mut no_rows = ResultStore::new(1);
        no_rows.set_first_page(QUERY, page(0..0)).unwrap();
        // A zero-row page is short, so paging ends before the row check.
        assert_eq!(no_rows.begin_load_more().unwrap_err(), LoadMoreSkip::NoMoreRows);

        let mut synthetic = ResultStore::new(1);
        synthetic.show_synthetic(QueryResult::error("boom"));
        assert_eq!(synthetic.begin_load_more().unwrap_err(), LoadMoreSkip::NoMoreRows);
    }

    #[test]
    fn test_second_load_while_loading_is_noop() {
        let mut store = store_with_first_page(200);
        let ticket = store.begin_load_more().unwrap();
        assert_eq!(ticket.request().offset, 200);
        assert_eq!(ticket.request().limit, 200);
        assert_eq!(ticket.request().sql, QUERY);

        assert_eq!(store.begin_load_more().unwrap_err(), LoadMoreSkip::AlreadyLoading);
        assert_eq!(store.row_count(), 200);
        assert!(store.is_loading_more());
    }

    #[test]
    fn test_append_is_strict() {
        let mut store = store_with_first_page(200);
        let before = store.rows().to_vec();

        let ticket = store.begin_load_more().unwrap();
        let outcome = store.finish_load_more(ticket, Ok(page(200..250)));

        assert_eq!(outcome, LoadMoreOutcome::Appended { rows: 50 });
        let mut expected = before;
        expected.extend(page(200..250).rows);
        assert_eq!(store.rows(), expected.as_slice());
        assert_eq!(store.cursor().offset, 250);
        assert!(!store.has_more());
        assert!(!store.is_loading_more());
    }

    #[test]
    fn test_append_keeps_generation() {
        let mut store = store_with_first_page(200);
        let generation = store.generation();

        let ticket = store.begin_load_more().unwrap();
        store.finish_load_more(ticket, Ok(page(200..400)));
        assert_eq!(store.generation(), generation);
        assert!(store.has_more());
    }

    #[test]
    fn test_failure_keeps_rows_and_stops_paging() {
        let mut store = store_with_first_page(200);
        let ticket = store.begin_load_more().unwrap();

        let outcome = store.finish_load_more(
            ticket,
            Err(EngineError::Query("connection lost".to_string())),
        );

        let error = match outcome {
            LoadMoreOutcome::Failed(error) => error,
            other => panic!("expected failure, got {:?}", other),
        };
        assert_eq!(error.offset, 200);
        assert_eq!(store.row_count(), 200);
        assert!(!store.has_more());
        assert!(!store.is_loading_more());
        assert_eq!(store.last_error(), Some(&error));
        assert_eq!(
            store.begin_load_more().unwrap_err(),
            LoadMoreSkip::NoMoreRows
        );
    }

    #[test]
    fn test_page_with_wrong_width_is_rejected() {
        let mut store = store_with_first_page(200);
        let ticket = store.begin_load_more().unwrap();
        let narrow = QueryResult {
            header: vec!["id".to_string()],
            rows: vec![vec!["200".to_string()]],
            query_time: "1ms".to_string(),
        };

        let outcome = store.finish_load_more(ticket, Ok(narrow));
        assert!(matches!(
            outcome,
            LoadMoreOutcome::Failed(PaginationError {
                source: EngineError::Shape(_),
                ..
            })
        ));
        assert_eq!(store.row_count(), 200);
    }

    #[test]
    fn test_page_after_reset_is_stale() {
        let mut store = store_with_first_page(200);
        let ticket = store.begin_load_more().unwrap();

        store.reset();
        let outcome = store.finish_load_more(ticket, Ok(page(200..400)));

        assert_eq!(outcome, LoadMoreOutcome::Stale);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_load_more_two_pages() {
        let engine = MockEngine::new().with_rows(250);
        let mut store = store_with_first_page(200);

        let outcome = store.load_more(&engine).await;
        assert_eq!(outcome, LoadMoreOutcome::Appended { rows: 50 });
        assert_eq!(store.row_count(), 250);
        assert!(!store.has_more());

        let outcome = store.load_more(&engine).await;
        assert_eq!(outcome, LoadMoreOutcome::Skipped(LoadMoreSkip::NoMoreRows));
        assert_eq!(store.row_count(), 250);
        assert_eq!(engine.requests(), vec![PageRequest::at(QUERY, 200, 200)]);
    }

    #[tokio::test]
    async fn test_load_more_exact_multiple_offers_empty_page() {
        let engine = MockEngine::new().with_rows(400);
        let mut store = store_with_first_page(200);

        store.load_more(&engine).await;
        assert_eq!(store.row_count(), 400);
        assert!(store.has_more());

        let outcome = store.load_more(&engine).await;
        assert_eq!(outcome, LoadMoreOutcome::Appended { rows: 0 });
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn test_load_more_engine_failure() {
        let engine = MockEngine::new()
            .with_rows(500)
            .with_more_error(EngineError::Unavailable("gone".to_string()));
        let mut store = store_with_first_page(200);

        let outcome = store.load_more(&engine).await;
        assert!(matches!(outcome, LoadMoreOutcome::Failed(_)));
        assert_eq!(store.row_count(), 200);
        assert!(!store.has_more());
    }
}
