//! SQL formatting for the Format action and generated queries.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// Re-print SQL with upper-case keywords, one `;`-terminated statement per line.
///
/// Parsed as SQLite, so backslashes in string literals are kept verbatim.
/// Text that does not parse is returned unchanged.
pub fn format_sql(sql: &str) -> String {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            tracing::debug!("Leaving SQL unformatted: {}", e);
            return sql.to_string();
        }
    };

    if statements.is_empty() {
        return sql.to_string();
    }

    statements
        .iter()
        .map(|statement| format!("{};", statement))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercases_keywords() {
        insta::assert_snapshot!(
            format_sql("select a, b from t where a = 1"),
            @"SELECT a, b FROM t WHERE a = 1;"
        );
    }

    #[test]
    fn test_table_function() {
        insta::assert_snapshot!(
            format_sql("select * from read_csv('data.csv')"),
            @"SELECT * FROM read_csv('data.csv');"
        );
    }

    #[test]
    fn test_backslashes_survive() {
        insta::assert_snapshot!(
            format_sql(r"select * from read_csv('C:\Users\me\data.csv')"),
            @r"SELECT * FROM read_csv('C:\Users\me\data.csv');"
        );
    }

    #[test]
    fn test_multiple_statements() {
        insta::assert_snapshot!(
            format_sql("select 1; select 2"),
            @r"
        SELECT 1;
        SELECT 2;
        "
        );
    }

    #[test]
    fn test_already_terminated_is_stable() {
        let once = format_sql("SELECT * FROM t;");
        assert_eq!(once, "SELECT * FROM t;");
        assert_eq!(format_sql(&once), once);
    }

    #[test]
    fn test_unparseable_text_unchanged() {
        assert_eq!(format_sql("selec * frm"), "selec * frm");
        assert_eq!(format_sql("   "), "   ");
    }
}
