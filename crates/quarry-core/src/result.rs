//! Tabular query results.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::ShapeError;

/// Sentinel used when no timing applies (e.g., a cancelled run).
pub const NO_QUERY_TIME: &str = "-";

/// Timing string used for synthetic error results.
pub const INSTANT_QUERY_TIME: &str = "<1ms";

/// A page of tabular output from the engine.
///
/// Every row has exactly `header.len()` cells. Row order is result order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in display order.
    pub header: Vec<String>,

    /// Row tuples; cell `i` belongs to `header[i]`.
    pub rows: Vec<Vec<String>>,

    /// Formatted execution time, or `"-"`.
    pub query_time: String,
}

impl QueryResult {
    /// Create a result, rejecting ragged rows and duplicate column names.
    pub fn new(
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        query_time: impl Into<String>,
    ) -> Result<Self, ShapeError> {
        let result = Self {
            header,
            rows,
            query_time: query_time.into(),
        };
        result.validate()?;
        Ok(result)
    }

    /// Synthetic single-cell result carrying an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            header: vec!["Error".to_string()],
            rows: vec![vec![message.into()]],
            query_time: INSTANT_QUERY_TIME.to_string(),
        }
    }

    /// Synthetic single-cell result shown after a run was cancelled.
    pub fn cancelled() -> Self {
        Self {
            header: vec!["Status".to_string()],
            rows: vec![vec!["Query cancelled".to_string()]],
            query_time: NO_QUERY_TIME.to_string(),
        }
    }

    /// Check the shape invariants.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let mut seen = HashSet::with_capacity(self.header.len());
        for name in &self.header {
            if !seen.insert(name.as_str()) {
                return Err(ShapeError::DuplicateColumn(name.clone()));
            }
        }
        self.validate_rows(&self.rows)
    }

    /// Check that every row in `rows` matches this result's width.
    pub fn validate_rows(&self, rows: &[Vec<String>]) -> Result<(), ShapeError> {
        let expected = self.header.len();
        match rows.iter().position(|row| row.len() != expected) {
            Some(row) => Err(ShapeError::RowWidth {
                row,
                expected,
                found: rows[row].len(),
            }),
            None => Ok(()),
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Whether the result carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Format an elapsed duration the way the results footer shows it.
pub fn format_query_time(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1 {
        INSTANT_QUERY_TIME.to_string()
    } else if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{}s", millis / 1_000)
    } else if millis < 3_600_000 {
        format!("{}m", millis / 60_000)
    } else {
        format!("{}h", millis / 3_600_000)
    }
}
