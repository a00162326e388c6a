//! Query execution controller.
//!
//! Owns the run/cancel state machine. A run is split around its single
//! suspension point: `begin_run` resets the store and hands back the request,
//! the host awaits the engine, and `complete_run` applies the response.
//! Responses for anything but the current run are ignored via a generation
//! counter, so a late answer can never overwrite a newer run.

use futures::future::BoxFuture;
use quarry_core::{
    CancelToken, EngineError, ExecutionState, PageRequest, QueryEngine, QueryResult,
};
use thiserror::Error;

use crate::editor::effective_query;
use crate::pagination::ResultStore;

// =============================================================================
// Run Handles
// =============================================================================

/// Identifies one run. Stale tickets are ignored by `complete_run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
}

/// A run that has been started and is waiting on the engine.
#[derive(Debug)]
pub struct PendingRun {
    pub ticket: RunTicket,
    pub request: PageRequest,
    pub cancel: CancelToken,
}

impl PendingRun {
    /// Issue the first-page request, resolving early if the run is cancelled.
    pub fn dispatch(
        &self,
        engine: &dyn QueryEngine,
    ) -> BoxFuture<'static, Result<QueryResult, EngineError>> {
        let fetch = engine.fetch(self.request.clone(), self.cancel.clone());
        let cancel = self.cancel.clone();
        Box::pin(async move { cancel.guard(fetch).await })
    }
}

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunRejected {
    /// A run is already outstanding.
    #[error("a query is already running")]
    AlreadyRunning,

    /// Neither the selection nor the buffer has any text.
    #[error("nothing to run")]
    EmptyQuery,
}

/// Result of the combined run/cancel control.
#[derive(Debug)]
pub enum Toggle {
    /// A new run started.
    Started(PendingRun),
    /// The outstanding run was asked to cancel.
    CancelRequested,
    /// Nothing happened (cancelling already, or nothing to run).
    Ignored,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    query_text: String,
    cancel: CancelToken,
}

// =============================================================================
// Execution Controller
// =============================================================================

/// Run/cancel state machine for the console.
#[derive(Debug)]
pub struct ExecutionController {
    state: ExecutionState,
    /// Generation counter for async cancellation.
    generation: u64,
    in_flight: Option<InFlight>,
    page_size: usize,
    last_run_text: Option<String>,
}

impl ExecutionController {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: ExecutionState::Idle,
            generation: 0,
            in_flight: None,
            page_size: page_size.max(1),
            last_run_text: None,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Text of the most recently started run.
    pub fn last_run_text(&self) -> Option<&str> {
        self.last_run_text.as_deref()
    }

    /// Start a run of the effective query text.
    pub fn begin_run(
        &mut self,
        store: &mut ResultStore,
        buffer: &str,
        selection: Option<&str>,
    ) -> Result<PendingRun, RunRejected> {
        if !self.state.can_run() {
            return Err(RunRejected::AlreadyRunning);
        }
        let query_text = effective_query(buffer, selection)
            .ok_or(RunRejected::EmptyQuery)?
            .to_string();

        store.reset();
        self.generation += 1;
        self.state = ExecutionState::Running;
        self.last_run_text = Some(query_text.clone());

        let cancel = CancelToken::new();
        self.in_flight = Some(InFlight {
            generation: self.generation,
            query_text: query_text.clone(),
            cancel: cancel.clone(),
        });

        tracing::info!(generation = self.generation, "Running query");
        Ok(PendingRun {
            ticket: RunTicket {
                generation: self.generation,
            },
            request: PageRequest::first(query_text, self.page_size),
            cancel,
        })
    }

    /// Ask the outstanding run to stop. Returns false when not running.
    pub fn cancel(&mut self) -> bool {
        if self.state != ExecutionState::Running {
            return false;
        }
        if let Some(in_flight) = &self.in_flight {
            in_flight.cancel.cancel();
        }
        self.state = ExecutionState::Cancelling;
        tracing::info!(generation = self.generation, "Cancelling query");
        true
    }

    /// Apply the engine's response to a run.
    ///
    /// Returns the new state, or `None` when the ticket is stale.
    pub fn complete_run(
        &mut self,
        ticket: RunTicket,
        outcome: Result<QueryResult, EngineError>,
        store: &mut ResultStore,
    ) -> Option<ExecutionState> {
        match &self.in_flight {
            Some(in_flight) if in_flight.generation == ticket.generation => {}
            _ => {
                tracing::debug!(
                    generation = ticket.generation,
                    current = self.generation,
                    "Ignoring stale run response"
                );
                return None;
            }
        }
        let in_flight = self.in_flight.take()?;

        let cancelled = self.state == ExecutionState::Cancelling
            || in_flight.cancel.is_cancelled()
            || matches!(outcome, Err(EngineError::Cancelled));

        let next = if cancelled {
            store.show_synthetic(QueryResult::cancelled());
            ExecutionState::Cancelled
        } else {
            match outcome {
                Ok(result) => match store.set_first_page(in_flight.query_text, result) {
                    Ok(()) => ExecutionState::Succeeded,
                    Err(shape) => {
                        let error = EngineError::from(shape);
                        tracing::error!("Engine returned a malformed page: {}", error);
                        store.show_synthetic(QueryResult::error(error.to_string()));
                        ExecutionState::Failed
                    }
                },
                Err(error) => {
                    tracing::warn!("Query failed: {}", error);
                    store.show_synthetic(QueryResult::error(error.to_string()));
                    ExecutionState::Failed
                }
            }
        };

        self.state = next;
        tracing::info!(
            generation = ticket.generation,
            state = ?next,
            rows = store.row_count(),
            "Run finished"
        );
        Some(next)
    }

    /// One control for run and cancel, depending on the current state.
    pub fn toggle(
        &mut self,
        store: &mut ResultStore,
        buffer: &str,
        selection: Option<&str>,
    ) -> Toggle {
        match self.state {
            ExecutionState::Running => {
                self.cancel();
                Toggle::CancelRequested
            }
            ExecutionState::Cancelling => Toggle::Ignored,
            _ => match self.begin_run(store, buffer, selection) {
                Ok(pending) => Toggle::Started(pending),
                Err(rejected) => {
                    tracing::debug!("Run not started: {}", rejected);
                    Toggle::Ignored
                }
            },
        }
    }

    /// Run to completion. Cancellation requires the split API.
    pub async fn run(
        &mut self,
        engine: &dyn QueryEngine,
        store: &mut ResultStore,
        buffer: &str,
        selection: Option<&str>,
    ) -> Result<ExecutionState, RunRejected> {
        let pending = self.begin_run(store, buffer, selection)?;
        let outcome = pending.dispatch(engine).await;
        Ok(self
            .complete_run(pending.ticket, outcome, store)
            .unwrap_or(self.state))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use crate::pagination::LoadMoreOutcome;
    use std::time::Duration;

    fn setup(page_size: usize) -> (ExecutionController, ResultStore) {
        (
            ExecutionController::new(page_size),
            ResultStore::new(page_size),
        )
    }

    fn one_row() -> QueryResult {
        QueryResult {
            header: vec!["1".to_string()],
            rows: vec![vec!["1".to_string()]],
            query_time: "<1ms".to_string(),
        }
    }

    #[tokio::test]
    async fn test_select_one() {
        let (mut controller, mut store) = setup(200);
        let pending = controller.begin_run(&mut store, "SELECT 1", None).unwrap();
        assert_eq!(controller.state(), ExecutionState::Running);
        assert_eq!(pending.request, PageRequest::first("SELECT 1", 200));

        let state = controller.complete_run(pending.ticket, Ok(one_row()), &mut store);

        assert_eq!(state, Some(ExecutionState::Succeeded));
        assert_eq!(store.header(), ["1".to_string()]);
        assert_eq!(store.rows(), [vec!["1".to_string()]]);
        assert_eq!(store.query_time(), "<1ms");
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn test_full_first_page_then_load_more() {
        let engine = MockEngine::new().with_rows(250);
        let (mut controller, mut store) = setup(200);

        let state = controller
            .run(&engine, &mut store, "SELECT * FROM big", None)
            .await
            .unwrap();
        assert_eq!(state, ExecutionState::Succeeded);
        assert_eq!(store.row_count(), 200);
        assert!(store.has_more());

        let outcome = store.load_more(&engine).await;
        assert_eq!(outcome, LoadMoreOutcome::Appended { rows: 50 });
        assert_eq!(store.row_count(), 250);
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn test_engine_error_becomes_error_row() {
        let engine = MockEngine::new().with_fetch_error(EngineError::Query(
            "syntax error at line 1".to_string(),
        ));
        let (mut controller, mut store) = setup(200);

        let state = controller
            .run(&engine, &mut store, "SELEC 1", None)
            .await
            .unwrap();

        assert_eq!(state, ExecutionState::Failed);
        assert_eq!(store.header(), ["Error".to_string()]);
        assert_eq!(store.rows(), [vec!["syntax error at line 1".to_string()]]);
        assert_eq!(store.query_time(), "<1ms");
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn test_cancel_before_response_discards_payload() {
        let engine = MockEngine::new()
            .with_rows(10)
            .with_delay(Duration::from_millis(50));
        let (mut controller, mut store) = setup(200);

        let pending = controller.begin_run(&mut store, "SELECT * FROM t", None).unwrap();
        let response = tokio::spawn(pending.dispatch(&engine));

        assert!(controller.cancel());
        assert_eq!(controller.state(), ExecutionState::Cancelling);

        let outcome = response.await.unwrap();
        assert_eq!(outcome, Err(EngineError::Cancelled));

        let state = controller.complete_run(pending.ticket, outcome, &mut store);
        assert_eq!(state, Some(ExecutionState::Cancelled));
        assert_eq!(store.header(), ["Status".to_string()]);
        assert_eq!(store.rows(), [vec!["Query cancelled".to_string()]]);
        assert_eq!(store.query_time(), "-");
    }

    #[test]
    fn test_payload_arriving_after_cancel_is_discarded() {
        let (mut controller, mut store) = setup(200);
        let pending = controller.begin_run(&mut store, "SELECT 1", None).unwrap();

        controller.cancel();
        let state = controller.complete_run(pending.ticket, Ok(one_row()), &mut store);

        assert_eq!(state, Some(ExecutionState::Cancelled));
        assert_eq!(store.rows(), [vec!["Query cancelled".to_string()]]);
    }

    #[test]
    fn test_cancel_when_not_running_is_noop() {
        let (mut controller, mut store) = setup(200);
        assert!(!controller.cancel());
        assert_eq!(controller.state(), ExecutionState::Idle);

        let pending = controller.begin_run(&mut store, "SELECT 1", None).unwrap();
        controller.complete_run(pending.ticket, Ok(one_row()), &mut store);
        assert!(!controller.cancel());
        assert_eq!(controller.state(), ExecutionState::Succeeded);
    }

    #[test]
    fn test_run_while_running_is_rejected() {
        let (mut controller, mut store) = setup(200);
        controller.begin_run(&mut store, "SELECT 1", None).unwrap();

        let rejected = controller.begin_run(&mut store, "SELECT 2", None).unwrap_err();
        assert_eq!(rejected, RunRejected::AlreadyRunning);

        controller.cancel();
        let rejected = controller.begin_run(&mut store, "SELECT 2", None).unwrap_err();
        assert_eq!(rejected, RunRejected::AlreadyRunning);
    }

    #[test]
    fn test_blank_query_is_rejected() {
        let (mut controller, mut store) = setup(200);
        let rejected = controller.begin_run(&mut store, "  \n", Some(" ")).unwrap_err();
        assert_eq!(rejected, RunRejected::EmptyQuery);
        assert_eq!(controller.state(), ExecutionState::Idle);
    }

    #[test]
    fn test_selection_overrides_buffer() {
        let (mut controller, mut store) = setup(200);
        let pending = controller
            .begin_run(&mut store, "SELECT 1;\nSELECT 2;", Some("SELECT 2;"))
            .unwrap();
        assert_eq!(pending.request.sql, "SELECT 2;");

        controller.complete_run(pending.ticket, Ok(one_row()), &mut store);
        assert_eq!(store.last_query_text(), "SELECT 2;");
        assert_eq!(controller.last_run_text(), Some("SELECT 2;"));
    }

    #[test]
    fn test_new_run_resets_store() {
        let (mut controller, mut store) = setup(200);
        let pending = controller.begin_run(&mut store, "SELECT 1", None).unwrap();
        controller.complete_run(pending.ticket, Ok(one_row()), &mut store);
        assert_eq!(store.row_count(), 1);

        controller.begin_run(&mut store, "SELECT 2", None).unwrap();
        assert_eq!(store.row_count(), 0);
        assert!(!store.has_header());
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let (mut controller, mut store) = setup(200);
        let first = controller.begin_run(&mut store, "SELECT 1", None).unwrap();
        controller.cancel();
        controller.complete_run(first.ticket, Err(EngineError::Cancelled), &mut store);

        let second = controller.begin_run(&mut store, "SELECT 2", None).unwrap();
        let state = controller.complete_run(first.ticket, Ok(one_row()), &mut store);

        assert_eq!(state, None);
        assert_eq!(controller.state(), ExecutionState::Running);
        assert_eq!(store.row_count(), 0);

        let state = controller.complete_run(second.ticket, Ok(one_row()), &mut store);
        assert_eq!(state, Some(ExecutionState::Succeeded));
    }

    #[test]
    fn test_malformed_first_page_fails_run() {
        let (mut controller, mut store) = setup(200);
        let pending = controller.begin_run(&mut store, "SELECT 1", None).unwrap();
        let ragged = QueryResult {
            header: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string()]],
            query_time: "1ms".to_string(),
        };

        let state = controller.complete_run(pending.ticket, Ok(ragged), &mut store);
        assert_eq!(state, Some(ExecutionState::Failed));
        assert_eq!(store.header(), ["Error".to_string()]);
        assert!(store.rows()[0][0].starts_with("Malformed result"));
    }

    #[test]
    fn test_toggle() {
        let (mut controller, mut store) = setup(200);

        let Toggle::Started(pending) = controller.toggle(&mut store, "SELECT 1", None) else {
            panic!("toggle should start a run");
        };
        assert!(matches!(
            controller.toggle(&mut store, "SELECT 1", None),
            Toggle::CancelRequested
        ));
        assert!(matches!(
            controller.toggle(&mut store, "SELECT 1", None),
            Toggle::Ignored
        ));

        controller.complete_run(pending.ticket, Err(EngineError::Cancelled), &mut store);
        assert_eq!(controller.state(), ExecutionState::Cancelled);
        assert!(matches!(
            controller.toggle(&mut store, "", None),
            Toggle::Ignored
        ));
    }
}
