//! Mock engine for testing.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use quarry_core::{CancelToken, EngineError, PageRequest, QueryEngine, QueryResult};
use std::sync::Arc;
use std::time::Duration;

/// Mock engine serving a synthetic two-column table of `total_rows` rows.
///
/// Row `i` is `[i, "row i"]`. The mock never observes cancellation, so a
/// cancelled request still resolves with its payload.
pub struct MockEngine {
    pub total_rows: usize,
    pub delay: Duration,
    pub fetch_error: Arc<Mutex<Option<EngineError>>>,
    pub more_error: Arc<Mutex<Option<EngineError>>>,
    pub requests: Arc<Mutex<Vec<PageRequest>>>,
}

impl MockEngine {
    /// Create a mock with an empty table.
    pub fn new() -> Self {
        Self {
            total_rows: 0,
            delay: Duration::ZERO,
            fetch_error: Arc::new(Mutex::new(None)),
            more_error: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the table size.
    pub fn with_rows(mut self, total_rows: usize) -> Self {
        self.total_rows = total_rows;
        self
    }

    /// Delay every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every first-page request.
    pub fn with_fetch_error(self, error: EngineError) -> Self {
        *self.fetch_error.lock() = Some(error);
        self
    }

    /// Fail every subsequent-page request.
    pub fn with_more_error(self, error: EngineError) -> Self {
        *self.more_error.lock() = Some(error);
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Row `index` of the synthetic table.
    pub fn row(index: usize) -> Vec<String> {
        vec![index.to_string(), format!("row {}", index)]
    }

    fn page(
        &self,
        request: PageRequest,
        error: Option<EngineError>,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        self.requests.lock().push(request.clone());
        let delay = self.delay;
        let total = self.total_rows;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = error {
                return Err(error);
            }
            let end = total.min(request.offset.saturating_add(request.limit));
            let rows = (request.offset.min(end)..end).map(Self::row).collect();
            Ok(QueryResult {
                header: vec!["id".to_string(), "name".to_string()],
                rows,
                query_time: "1ms".to_string(),
            })
        })
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine for MockEngine {
    fn fetch(
        &self,
        request: PageRequest,
        _cancel: CancelToken,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        let error = self.fetch_error.lock().clone();
        self.page(request, error)
    }

    fn fetch_more(
        &self,
        request: PageRequest,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        let error = self.more_error.lock().clone();
        self.page(request, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_engine_pages() {
        let engine = MockEngine::new().with_rows(250);

        let first = engine
            .fetch(PageRequest::first("q", 200), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(first.row_count(), 200);

        let second = engine
            .fetch_more(PageRequest::at("q", 200, 200))
            .await
            .unwrap();
        assert_eq!(second.row_count(), 50);
        assert_eq!(second.rows[0], MockEngine::row(200));
        assert_eq!(engine.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_engine_with_delay() {
        let engine = MockEngine::new()
            .with_rows(1)
            .with_delay(Duration::from_millis(10));

        let start = std::time::Instant::now();
        let _ = engine
            .fetch(PageRequest::first("q", 10), CancelToken::new())
            .await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
