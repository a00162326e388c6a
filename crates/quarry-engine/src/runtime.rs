//! Persistent SQLite session with thread-safe async access.
//!
//! A rusqlite `Connection` is not `Sync`, and statements block while they
//! step. The session therefore lives on a dedicated OS thread; callers send it
//! closures and await the answer on a oneshot channel.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use quarry_core::EngineError;
use rusqlite::{Connection, InterruptHandle};
use tokio::sync::oneshot;

use crate::session::Session;

/// Boxed job run on the session thread.
type SessionFn = Box<dyn FnOnce(&mut Session) + Send>;

/// Requests for the session thread.
enum SessionRequest {
    /// Run a job against the session.
    Run(SessionFn),
    Shutdown,
}

/// SQLite session running on a dedicated OS thread.
pub struct SqliteRuntime {
    tx: mpsc::Sender<SessionRequest>,
    interrupt: InterruptHandle,
    _handle: JoinHandle<()>,
}

impl SqliteRuntime {
    /// Open `database` (a path or ":memory:") and start the session thread.
    pub fn open(database: &str) -> Result<Self, EngineError> {
        let conn = if database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(database)
        }
        .map_err(|e| EngineError::Unavailable(format!("cannot open '{}': {}", database, e)))?;

        Ok(Self::new(conn))
    }

    /// Start the session thread around an open connection.
    ///
    /// MUST use std::thread::spawn, NOT tokio::spawn: jobs block while stepping.
    pub fn new(conn: Connection) -> Self {
        let interrupt = conn.get_interrupt_handle();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            tracing::info!("SQLite session thread started");
            let mut session = Session::new(conn);

            while let Ok(request) = rx.recv() {
                match request {
                    SessionRequest::Run(job) => job(&mut session),
                    SessionRequest::Shutdown => {
                        tracing::info!("SQLite session thread shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            tx,
            interrupt,
            _handle: handle,
        }
    }

    /// Run a closure on the session thread.
    pub async fn call<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Session) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let (resp_tx, resp_rx) = oneshot::channel();

        let job: SessionFn = Box::new(move |session| {
            let _ = resp_tx.send(f(session));
        });

        self.tx
            .send(SessionRequest::Run(job))
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        resp_rx
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?
    }

    /// Run with a deadline. On expiry the running statement is interrupted.
    pub async fn call_timeout<F, T>(&self, timeout: Duration, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Session) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(timeout, self.call(f)).await {
            Ok(result) => result,
            Err(_) => {
                self.interrupt();
                Err(EngineError::Timeout { duration: timeout })
            }
        }
    }

    /// Abort whatever statement is stepping right now.
    pub fn interrupt(&self) {
        tracing::debug!("Interrupting running statement");
        self.interrupt.interrupt();
    }

    /// Shutdown the session thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionRequest::Shutdown);
    }
}

impl Drop for SqliteRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDLESS: &str =
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c";

    #[tokio::test]
    async fn test_call_basic() {
        let runtime = SqliteRuntime::open(":memory:").unwrap();

        let value: i64 = runtime
            .call(|session| {
                session
                    .connection()
                    .query_row("SELECT 1 + 2", [], |row| row.get(0))
                    .map_err(|e| EngineError::Query(e.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_call_error() {
        let runtime = SqliteRuntime::open(":memory:").unwrap();

        let result: Result<(), EngineError> = runtime
            .call(|session| {
                session
                    .connection()
                    .execute_batch("SELEC 1")
                    .map_err(|e| EngineError::Query(e.to_string()))
            })
            .await;

        assert!(matches!(result, Err(EngineError::Query(_))));
    }

    #[tokio::test]
    async fn test_timeout_interrupts_and_recovers() {
        let runtime = SqliteRuntime::open(":memory:").unwrap();

        let result: Result<i64, EngineError> = runtime
            .call_timeout(Duration::from_millis(50), |session| {
                session
                    .connection()
                    .query_row(ENDLESS, [], |row| row.get(0))
                    .map_err(|e| EngineError::Query(e.to_string()))
            })
            .await;
        assert!(matches!(result, Err(EngineError::Timeout { .. })));

        // The session thread is free again once the statement was interrupted.
        let value: i64 = runtime
            .call_timeout(Duration::from_secs(5), |session| {
                session
                    .connection()
                    .query_row("SELECT 42", [], |row| row.get(0))
                    .map_err(|e| EngineError::Query(e.to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_open_bad_path() {
        let result = SqliteRuntime::open("/nonexistent-dir/for/sure/db.sqlite");
        assert!(matches!(result, Err(EngineError::Unavailable(_))));
    }
}
