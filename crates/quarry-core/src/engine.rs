//! The contract between the console and a query engine.
//!
//! The engine is an external collaborator. The console only needs to ask for
//! a bounded page of a query's output and to be able to abandon a request.
//! Implementations return boxed futures so the caller decides where to spawn.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::EngineError;
use crate::result::QueryResult;

// =============================================================================
// Page Request
// =============================================================================

/// A bounded slice of a query's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Query text, sent verbatim.
    pub sql: String,

    /// Number of leading rows to skip.
    pub offset: usize,

    /// Maximum number of rows to return.
    pub limit: usize,
}

impl PageRequest {
    /// Request the first page of a query.
    pub fn first(sql: impl Into<String>, limit: usize) -> Self {
        Self {
            sql: sql.into(),
            offset: 0,
            limit,
        }
    }

    /// Request the page starting at `offset`.
    pub fn at(sql: impl Into<String>, offset: usize, limit: usize) -> Self {
        Self {
            sql: sql.into(),
            offset,
            limit,
        }
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation handle for one run.
///
/// Clones share the same flag. A token is never reused across runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Create a fresh, untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not lost.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Drive `fut` until it completes or this token is cancelled.
    ///
    /// A cancelled token always wins, even if `fut` is also ready.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(EngineError::Cancelled),
            result = fut => {
                if self.is_cancelled() {
                    Err(EngineError::Cancelled)
                } else {
                    result
                }
            }
        }
    }
}

// =============================================================================
// Engine Trait
// =============================================================================

/// Asynchronous query engine.
///
/// Both calls must be idempotent for the same `(sql, offset, limit)` triple,
/// modulo the underlying data changing between calls.
pub trait QueryEngine: Send + Sync {
    /// Fetch the first page of a run. The engine may observe `cancel` to stop early.
    fn fetch(
        &self,
        request: PageRequest,
        cancel: CancelToken,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>>;

    /// Fetch a subsequent page. There is no cancellation path for pages.
    fn fetch_more(&self, request: PageRequest)
        -> BoxFuture<'static, Result<QueryResult, EngineError>>;
}
