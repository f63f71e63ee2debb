use async_trait::async_trait;

use crate::error::Result;
use crate::ingest::schema::ColumnDescriptor;

pub mod clickhouse;
#[cfg(test)]
pub mod memory;
pub mod sql;

pub use clickhouse::ClickHouse;
pub use sql::{CreateTable, InsertStatement};

/// Rows returned by a query, values as text in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Capabilities the ingestion pipeline needs from the analytical database.
///
/// Implementations send statement text as given; quoting and escaping are
/// done by the caller through [`sql`].
#[async_trait]
pub trait Database: Send + Sync {
    /// Tables in the connection's database
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names and reported types of `table`, in table order
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    async fn create_table(&self, create: &CreateTable) -> Result<()>;

    /// Run a `SELECT` and materialize the full result
    async fn query_rows(&self, statement: &str) -> Result<RowSet>;

    /// Run a query that carries its own `FORMAT` clause and return the raw body
    async fn query_text(&self, statement: &str) -> Result<String>;

    async fn insert(&self, insert: &InsertStatement) -> Result<()>;

    /// Run a statement with no result set, returning the rows it wrote
    async fn execute(&self, statement: &str) -> Result<u64>;
}
