//! Statement text for the ClickHouse dialect.
//!
//! Every identifier and value that ends up inside statement text goes through
//! [`quote_ident`], [`quote_table`] or [`quote_literal`]. The database client
//! itself never escapes anything.

use crate::config::InsertFormat;
use crate::error::{ChflatError, Result};

/// Placeholder type every generated column gets
pub const FALLBACK_TYPE: &str = "String";

/// `CREATE TABLE` statement for a destination table
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<String>,
    pub statement: String,
}

/// A rendered batch insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Statement text. For `JSONEachRow` this ends in `FORMAT JSONEachRow`
    /// and the rows travel in `body`.
    pub query: String,
    pub body: Option<String>,
    pub row_count: usize,
}

/// Quote a single identifier with backticks
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('`');
    out
}

/// Quote a table name, treating the first `.` as a database separator.
///
/// `events` -> `` `events` ``, `raw.events` -> `` `raw`.`events` ``
pub fn quote_table(name: &str) -> String {
    match split_qualified(name) {
        Some((database, table)) => format!("{}.{}", quote_ident(database), quote_ident(table)),
        None => quote_ident(name),
    }
}

/// Quote a source table, placing an unqualified name in `database`.
///
/// A name that already carries a database part is quoted exactly as
/// [`quote_table`] quotes it, so a source is described and read as the same table.
pub fn quote_source(database: &str, table: &str) -> String {
    match split_qualified(table) {
        Some(_) => quote_table(table),
        None => format!("{}.{}", quote_ident(database), quote_ident(table)),
    }
}

fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
        .filter(|(database, table)| !database.is_empty() && !table.is_empty())
}

/// Quote a value as a single-quoted string literal
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Comma-separated quoted column list
pub fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// DDL for an append-only destination table, one `String` column per
/// projected name, in projection order.
pub fn create_table(table: &str, columns: &[String]) -> CreateTable {
    let definitions = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(c), FALLBACK_TYPE))
        .collect::<Vec<_>>()
        .join(", ");

    CreateTable {
        table: table.to_string(),
        columns: columns.to_vec(),
        statement: format!(
            "CREATE TABLE {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
            quote_table(table),
            definitions
        ),
    }
}

/// Render one batch of already-projected rows.
///
/// Every row must have exactly one value per column.
pub fn render_insert(
    table: &str,
    columns: &[String],
    rows: &[Vec<String>],
    format: InsertFormat,
) -> Result<InsertStatement> {
    if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
        return Err(ChflatError::Write(format!(
            "row has {} values for {} columns",
            bad.len(),
            columns.len()
        )));
    }

    let target = format!("INSERT INTO {} ({})", quote_table(table), column_list(columns));

    let (query, body) = match format {
        InsertFormat::JsonEachRow => {
            let mut body = String::new();
            for row in rows {
                body.push_str(&json_object(columns, row)?);
                body.push('\n');
            }
            (format!("{} FORMAT JSONEachRow", target), Some(body))
        }
        InsertFormat::Values => {
            let tuples = rows
                .iter()
                .map(|row| {
                    let values = row.iter().map(|v| quote_literal(v)).collect::<Vec<_>>();
                    format!("({})", values.join(", "))
                })
                .collect::<Vec<_>>()
                .join(", ");
            (format!("{} VALUES {}", target, tuples), None)
        }
    };

    Ok(InsertStatement {
        table: table.to_string(),
        query,
        body,
        row_count: rows.len(),
    })
}

/// One JSON object with keys in column order. Built by hand so a repeated
/// column name stays repeated instead of collapsing into one key.
fn json_object(columns: &[String], row: &[String]) -> Result<String> {
    let mut out = String::from("{");
    for (idx, (column, value)) in columns.iter().zip(row).enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let key = serde_json::to_string(column)
            .map_err(|e| ChflatError::Write(format!("encode column {}: {}", column, e)))?;
        let value = serde_json::to_string(value)
            .map_err(|e| ChflatError::Write(format!("encode value of {}: {}", column, e)))?;
        out.push_str(&key);
        out.push(':');
        out.push_str(&value);
    }
    out.push('}');
    Ok(out)
}

/// `SELECT` of the projected columns from a source table
pub fn select_columns(database: &str, table: &str, columns: &[String]) -> String {
    format!("SELECT {} FROM {}", column_list(columns), quote_source(database, table))
}

/// Server-side copy of the projected columns of `source` into `destination`
pub fn insert_select(
    destination: &str,
    database: &str,
    source: &str,
    columns: &[String],
) -> String {
    format!(
        "INSERT INTO {} ({}) {}",
        quote_table(destination),
        column_list(columns),
        select_columns(database, source, columns)
    )
}

/// First `limit` rows of a table
pub fn preview(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {} LIMIT {}", quote_table(table), limit)
}

/// Whole table as CSV with a header row
pub fn download(table: &str) -> String {
    format!("SELECT * FROM {} FORMAT CSVWithNames", quote_table(table))
}
