//! File table functions.
//!
//! Queries may read files directly, e.g. `SELECT * FROM read_csv('data.csv')`.
//! Each call is rewritten to a temp table that is loaded from the file first.
//! Every column is stored as TEXT.
//!
//! Named arguments may follow the path:
//! `read_csv('data.csv', delimiter => ';', has_header => false)` or
//! `read_excel('book.xlsx', sheet_name => 'Q3')`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;

use calamine::{open_workbook_auto, Data, Reader};
use quarry_core::EngineError;
use regex::Regex;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

use crate::session::unique_header;

/// Matches `read_xxx('<path>'[, name => value]*)` with `''` escapes inside literals.
const FILE_FUNCTION_PATTERN: &str = r"(?i)\b(read_csv|read_tsv|read_json|read_ndjson|read_text|read_parquet|read_excel|read_xlsx)\s*\(\s*'((?:[^']|'')*)'((?:\s*,\s*\w+\s*=>\s*(?:'(?:[^']|'')*'|\w+))*)\s*\)";

/// One `name => value` argument.
const OPTION_PATTERN: &str = r"(\w+)\s*=>\s*('(?:[^']|'')*'|\w+)";

/// Loaded table contents before insertion. `None` cells become SQL NULL.
struct FileData {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

/// Named arguments of a file function call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct FileOptions {
    has_header: Option<bool>,
    delimiter: Option<u8>,
    sheet_name: Option<String>,
}

/// A file function call found in the query text.
struct FileCall {
    range: Range<usize>,
    function: String,
    path: String,
    options: String,
}

/// Registry of temp tables backing file function calls.
pub struct FileTables {
    pattern: Regex,
    option_pattern: Regex,
    /// (function, path, options) -> table name
    tables: HashMap<(String, String, FileOptions), String>,
    next_id: usize,
}

impl FileTables {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(FILE_FUNCTION_PATTERN).expect("file function pattern is valid"),
            option_pattern: Regex::new(OPTION_PATTERN).expect("option pattern is valid"),
            tables: HashMap::new(),
            next_id: 0,
        }
    }

    /// Replace file function calls in `sql` with temp table names.
    ///
    /// With `reload`, files are read again even if already loaded.
    pub fn rewrite(
        &mut self,
        conn: &Connection,
        sql: &str,
        reload: bool,
    ) -> Result<String, EngineError> {
        let mut output = String::with_capacity(sql.len());
        let mut last = 0;

        let calls: Vec<FileCall> = self
            .pattern
            .captures_iter(sql)
            .filter_map(|caps| {
                Some(FileCall {
                    range: caps.get(0)?.range(),
                    function: canonical_function(caps.get(1)?.as_str()),
                    path: caps.get(2)?.as_str().replace("''", "'"),
                    options: caps.get(3).map_or("", |m| m.as_str()).to_string(),
                })
            })
            .collect();

        for call in calls {
            let options = self.parse_options(&call.function, &call.options)?;
            let table = self.ensure_table(conn, &call.function, &call.path, options, reload)?;
            output.push_str(&sql[last..call.range.start]);
            output.push_str(&quote_identifier(&table));
            last = call.range.end;
        }
        output.push_str(&sql[last..]);
        Ok(output)
    }

    fn parse_options(&self, function: &str, text: &str) -> Result<FileOptions, EngineError> {
        let mut options = FileOptions::default();

        for caps in self.option_pattern.captures_iter(text) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let name = name.as_str().to_ascii_lowercase();
            let value = OptionValue::parse(value.as_str());

            match name.as_str() {
                "has_header" => options.has_header = Some(value.boolean(function, &name)?),
                "delimiter" => {
                    options.delimiter = Some(parse_delimiter(&value.string(function, &name)?)?)
                }
                "sheet_name" => options.sheet_name = Some(value.string(function, &name)?),
                // Columns are always TEXT.
                "infer_schema" => {
                    value.boolean(function, &name)?;
                }
                other => tracing::debug!(function, option = other, "Ignoring unknown option"),
            }
        }
        Ok(options)
    }

    fn ensure_table(
        &mut self,
        conn: &Connection,
        function: &str,
        path: &str,
        options: FileOptions,
        reload: bool,
    ) -> Result<String, EngineError> {
        let key = (function.to_string(), path.to_string(), options);
        if let Some(table) = self.tables.get(&key) {
            if !reload {
                return Ok(table.clone());
            }
        }

        let table = match self.tables.get(&key) {
            Some(table) => table.clone(),
            None => {
                self.next_id += 1;
                format!("quarry_file_{}", self.next_id)
            }
        };

        let data = load_file(function, path, &key.2)?;
        if data.columns.is_empty() {
            return Err(file_error(path, "no columns found"));
        }
        create_table(conn, &table, &data).map_err(|e| file_error(path, e))?;
        tracing::info!(
            function,
            path,
            rows = data.rows.len(),
            table = %table,
            "File loaded"
        );

        self.tables.insert(key, table.clone());
        Ok(table)
    }
}

impl Default for FileTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower-cased function name with aliases folded.
fn canonical_function(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "read_xlsx" => "read_excel".to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Options
// =============================================================================

enum OptionValue {
    Quoted(String),
    Bare(String),
}

impl OptionValue {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            Some(inner) => OptionValue::Quoted(inner.replace("''", "'")),
            None => OptionValue::Bare(raw.to_string()),
        }
    }

    fn boolean(&self, function: &str, name: &str) -> Result<bool, EngineError> {
        match self {
            OptionValue::Bare(b) if b.eq_ignore_ascii_case("true") => Ok(true),
            OptionValue::Bare(b) if b.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(option_error(function, name, "expects true or false")),
        }
    }

    fn string(&self, function: &str, name: &str) -> Result<String, EngineError> {
        match self {
            OptionValue::Quoted(s) => Ok(s.clone()),
            OptionValue::Bare(_) => Err(option_error(function, name, "expects a quoted string")),
        }
    }
}

/// A single byte, or one of the escapes `\t`, `\n`, `\r`, `\\`, `\0`.
fn parse_delimiter(value: &str) -> Result<u8, EngineError> {
    match value {
        "\\t" => Ok(b'\t'),
        "\\n" => Ok(b'\n'),
        "\\r" => Ok(b'\r'),
        "\\\\" => Ok(b'\\'),
        "\\0" => Ok(b'\0'),
        single if single.len() == 1 => Ok(single.as_bytes()[0]),
        other => Err(EngineError::Query(format!(
            "delimiter must be a single character, got '{}'",
            other
        ))),
    }
}

fn option_error(function: &str, name: &str, message: &str) -> EngineError {
    EngineError::Query(format!("{}: option '{}' {}", function, name, message))
}

// =============================================================================
// Loaders
// =============================================================================

fn load_file(function: &str, path: &str, options: &FileOptions) -> Result<FileData, EngineError> {
    match function {
        "read_csv" => load_delimited(
            path,
            options.delimiter.unwrap_or(b','),
            options.has_header.unwrap_or(true),
        ),
        // Tab always wins for TSV.
        "read_tsv" => load_delimited(path, b'\t', options.has_header.unwrap_or(true)),
        "read_json" => load_json(path),
        "read_ndjson" => load_ndjson(path),
        "read_text" => load_text(path),
        "read_excel" => load_excel(path, options.sheet_name.as_deref()),
        other => Err(EngineError::Unsupported(format!(
            "{} is not available for SQLite databases",
            other
        ))),
    }
}

fn load_delimited(path: &str, delimiter: u8, has_header: bool) -> Result<FileData, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .flexible(true)
        .from_path(path)
        .map_err(|e| file_error(path, e))?;

    let mut columns: Vec<String> = if has_header {
        let headers = reader.headers().map_err(|e| file_error(path, e))?;
        headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if name.trim().is_empty() {
                    format!("column{}", i)
                } else {
                    name.to_string()
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let first_line = if has_header { 2 } else { 1 };
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| file_error(path, format!("line {}: {}", line + first_line, e)))?;
        // Ragged records widen the table.
        while columns.len() < record.len() {
            columns.push(format!("column{}", columns.len()));
        }
        rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
    }

    Ok(FileData {
        columns: unique_header(columns),
        rows,
    })
}

/// First row is the header. Reads the first sheet unless one is named.
fn load_excel(path: &str, sheet_name: Option<&str>) -> Result<FileData, EngineError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| file_error(path, e))?;
    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| file_error(path, "workbook has no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| file_error(path, format!("sheet '{}': {}", sheet, e)))?;

    let mut rows = range.rows();
    let mut columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| match excel_cell(cell) {
                Some(name) if !name.trim().is_empty() => name,
                _ => format!("column{}", i),
            })
            .collect(),
        None => Vec::new(),
    };

    let rows: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();
    for row in &rows {
        while columns.len() < row.len() {
            columns.push(format!("column{}", columns.len()));
        }
    }

    Ok(FileData {
        columns: unique_header(columns),
        rows,
    })
}

/// Empty cells become NULL; everything else uses its display form.
fn excel_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn load_json(path: &str) -> Result<FileData, EngineError> {
    let file = File::open(path).map_err(|e| file_error(path, e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| file_error(path, e))?;

    let objects = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| into_object(path, item))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(object) => vec![object],
        _ => return Err(file_error(path, "expected an array of objects")),
    };
    Ok(objects_to_data(objects))
}

fn load_ndjson(path: &str) -> Result<FileData, EngineError> {
    let file = File::open(path).map_err(|e| file_error(path, e))?;
    let mut objects = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| file_error(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| file_error(path, format!("line {}: {}", line_no + 1, e)))?;
        objects.push(into_object(path, value)?);
    }
    Ok(objects_to_data(objects))
}

fn load_text(path: &str) -> Result<FileData, EngineError> {
    let file = File::open(path).map_err(|e| file_error(path, e))?;
    let rows = BufReader::new(file)
        .lines()
        .map(|line| line.map(|l| vec![Some(l)]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| file_error(path, e))?;

    Ok(FileData {
        columns: vec!["line".to_string()],
        rows,
    })
}

fn into_object(path: &str, value: Value) -> Result<Map<String, Value>, EngineError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(file_error(
            path,
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
    }
}

/// Columns are the union of all object keys.
fn objects_to_data(objects: Vec<Map<String, Value>>) -> FileData {
    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|column| match object.get(column) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect()
        })
        .collect();

    FileData { columns, rows }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Table Creation
// =============================================================================

fn create_table(conn: &Connection, table: &str, data: &FileData) -> rusqlite::Result<()> {
    let quoted = quote_identifier(table);
    let column_defs = data
        .columns
        .iter()
        .map(|c| format!("{} TEXT", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; data.columns.len()].join(", ");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS temp.{quoted}; CREATE TEMP TABLE {quoted} ({column_defs});"
    ))?;
    {
        let mut insert = tx.prepare(&format!("INSERT INTO {} VALUES ({})", quoted, placeholders))?;
        let width = data.columns.len();
        for row in &data.rows {
            let cells = (0..width).map(|i| row.get(i).cloned().flatten());
            insert.execute(params_from_iter(cells))?;
        }
    }
    tx.commit()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn file_error(path: &str, message: impl ToString) -> EngineError {
    EngineError::File {
        path: path.to_string(),
        message: message.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
