//! Page execution against a SQLite connection.

use std::collections::HashSet;
use std::time::Instant;

use quarry_core::{format_query_time, CancelToken, EngineError, PageRequest, QueryResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, Row};

use crate::files::FileTables;

/// Header used for statements that do not return rows.
pub const ROWS_AFFECTED: &str = "Rows affected";

/// How often (in rows) a long scan checks for cancellation.
const CANCEL_CHECK_INTERVAL: usize = 1_024;

/// Connection plus the temp tables registered for file functions.
pub struct Session {
    conn: Connection,
    files: FileTables,
}

impl Session {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            files: FileTables::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Execute `request.sql` and return rows `offset..offset + limit`.
    ///
    /// `reload_files` re-reads any files referenced through table functions;
    /// later pages reuse the tables loaded for the first page.
    pub fn fetch_page(
        &mut self,
        request: &PageRequest,
        reload_files: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<QueryResult, EngineError> {
        let started = Instant::now();
        let sql = self.files.rewrite(&self.conn, &request.sql, reload_files)?;

        let mut stmt = self.conn.prepare(sql.trim()).map_err(query_error)?;

        if stmt.column_count() == 0 {
            // Re-running a write for a later page would repeat it.
            if request.offset > 0 {
                return Ok(QueryResult::new(
                    vec![ROWS_AFFECTED.to_string()],
                    Vec::new(),
                    format_query_time(started.elapsed()),
                )?);
            }
            let changed = stmt.execute([]).map_err(query_error)?;
            tracing::debug!(changed, "Statement executed");
            return Ok(QueryResult::new(
                vec![ROWS_AFFECTED.to_string()],
                vec![vec![changed.to_string()]],
                format_query_time(started.elapsed()),
            )?);
        }

        let header = unique_header(stmt.column_names());
        let width = header.len();
        let end = request.offset.saturating_add(request.limit);

        let mut rows = Vec::with_capacity(request.limit.min(CANCEL_CHECK_INTERVAL));
        let mut cursor = stmt.query([]).map_err(query_error)?;
        let mut index = 0usize;

        while index < end {
            if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(EngineError::Cancelled);
            }
            let Some(row) = cursor.next().map_err(query_error)? else {
                break;
            };
            if index >= request.offset {
                rows.push(row_cells(row, width).map_err(query_error)?);
            }
            index += 1;
        }

        let result = QueryResult::new(header, rows, format_query_time(started.elapsed()))?;
        tracing::debug!(
            offset = request.offset,
            rows = result.row_count(),
            elapsed = %result.query_time,
            "Page fetched"
        );
        Ok(result)
    }
}

/// Map a rusqlite error, treating interruption as cancellation.
fn query_error(error: rusqlite::Error) -> EngineError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::OperationInterrupted =>
        {
            EngineError::Cancelled
        }
        _ => EngineError::Query(error.to_string()),
    }
}

/// Render one row as display strings.
fn row_cells(row: &Row<'_>, width: usize) -> rusqlite::Result<Vec<String>> {
    (0..width)
        .map(|i| {
            Ok(match row.get_ref(i)? {
                ValueRef::Null => "NULL".to_string(),
                ValueRef::Integer(value) => value.to_string(),
                ValueRef::Real(value) => value.to_string(),
                ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                ValueRef::Blob(bytes) => format!("<{} bytes>", bytes.len()),
            })
        })
        .collect()
}

/// Column names with duplicates suffixed (`id`, `id_1`, ...).
pub fn unique_header<S: AsRef<str>>(names: Vec<S>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            let base = name.as_ref().to_string();
            let mut candidate = base.clone();
            let mut suffix = 1;
            while seen.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER, name TEXT, score REAL, data BLOB);
             WITH RECURSIVE n(i) AS (SELECT 0 UNION ALL SELECT i + 1 FROM n WHERE i < 449)
             INSERT INTO t SELECT i, 'name ' || i, i * 0.5, NULL FROM n;
             UPDATE t SET name = NULL WHERE id = 3;
             UPDATE t SET data = x'00ff' WHERE id = 4;",
        )
        .unwrap();
        Session::new(conn)
    }

    fn page(session: &mut Session, sql: &str, offset: usize, limit: usize) -> QueryResult {
        session
            .fetch_page(&PageRequest::at(sql, offset, limit), offset == 0, None)
            .unwrap()
    }

    #[test]
    fn test_select_one() {
        let mut session = session();
        let result = page(&mut session, "SELECT 1", 0, 200);
        assert_eq!(result.header, vec!["1"]);
        assert_eq!(result.rows, vec![vec!["1"]]);
    }

    #[test]
    fn test_pages_are_contiguous() {
        let mut session = session();
        let sql = "SELECT id FROM t ORDER BY id";

        let first = page(&mut session, sql, 0, 200);
        let second = page(&mut session, sql, 200, 200);
        let third = page(&mut session, sql, 400, 200);

        assert_eq!(first.row_count(), 200);
        assert_eq!(second.row_count(), 200);
        assert_eq!(third.row_count(), 50);
        assert_eq!(second.rows[0], vec!["200"]);
        assert_eq!(third.rows.last().unwrap(), &vec!["449".to_string()]);
    }

    #[test]
    fn test_same_page_twice_is_identical() {
        let mut session = session();
        let sql = "SELECT * FROM t ORDER BY id";
        assert_eq!(
            page(&mut session, sql, 200, 10).rows,
            page(&mut session, sql, 200, 10).rows
        );
    }

    #[test]
    fn test_cell_rendering() {
        let mut session = session();
        let result = page(&mut session, "SELECT * FROM t WHERE id IN (3, 4) ORDER BY id", 0, 10);
        assert_eq!(result.rows[0], vec!["3", "NULL", "1.5", "NULL"]);
        assert_eq!(result.rows[1], vec!["4", "name 4", "2", "<2 bytes>"]);
    }

    #[test]
    fn test_duplicate_columns_are_renamed() {
        let mut session = session();
        let result = page(&mut session, "SELECT 1 AS id, 2 AS id, 3 AS id", 0, 10);
        assert_eq!(result.header, vec!["id", "id_1", "id_2"]);
    }

    #[test]
    fn test_unique_header_skips_taken_names() {
        assert_eq!(unique_header(vec!["a", "a_1", "a"]), vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn test_write_statement_reports_changes() {
        let mut session = session();
        let result = page(&mut session, "DELETE FROM t WHERE id < 10", 0, 200);
        assert_eq!(result.header, vec![ROWS_AFFECTED]);
        assert_eq!(result.rows, vec![vec!["10"]]);

        let later = page(&mut session, "DELETE FROM t WHERE id < 20", 200, 200);
        assert!(later.rows.is_empty());
        let remaining = page(&mut session, "SELECT count(*) FROM t", 0, 1);
        assert_eq!(remaining.rows, vec![vec!["440"]]);
    }

    #[test]
    fn test_syntax_error() {
        let mut session = session();
        let err = session
            .fetch_page(&PageRequest::first("SELEC 1", 200), true, None)
            .unwrap_err();
        match err {
            EngineError::Query(message) => assert!(message.contains("syntax error")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_token_stops_scan() {
        let mut session = session();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = session
            .fetch_page(&PageRequest::first("SELECT * FROM t", 200), true, Some(&cancel))
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }
}
