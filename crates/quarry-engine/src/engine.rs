//! QueryEngine implementation backed by SQLite.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use quarry_core::{CancelToken, EngineError, PageRequest, QueryEngine, QueryResult};

use crate::runtime::SqliteRuntime;

/// Default statement deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-backed engine. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SqliteEngine {
    runtime: Arc<SqliteRuntime>,
    timeout: Duration,
}

impl SqliteEngine {
    /// Open `database` (a path or ":memory:").
    pub fn open(database: &str) -> Result<Self, EngineError> {
        let runtime = SqliteRuntime::open(database)?;
        tracing::info!(database, "SQLite engine opened");
        Ok(Self {
            runtime: Arc::new(runtime),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(":memory:")
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runtime(&self) -> &SqliteRuntime {
        &self.runtime
    }
}

impl QueryEngine for SqliteEngine {
    fn fetch(
        &self,
        request: PageRequest,
        cancel: CancelToken,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        let runtime = Arc::clone(&self.runtime);
        let timeout = self.timeout;

        Box::pin(async move {
            let token = cancel.clone();
            let work = runtime.call_timeout(timeout, move |session| {
                session.fetch_page(&request, true, Some(&token))
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    runtime.interrupt();
                    Err(EngineError::Cancelled)
                }
                result = work => result,
            }
        })
    }

    fn fetch_more(&self, request: PageRequest) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        let runtime = Arc::clone(&self.runtime);
        let timeout = self.timeout;

        Box::pin(async move {
            runtime
                .call_timeout(timeout, move |session| session.fetch_page(&request, false, None))
                .await
        })
    }
}
