use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use super::inference::InferredFile;
use super::projection::Projection;
use super::row::Row;
use crate::db::{sql, Database, RowSet};
use crate::error::{ChflatError, Result};

/// A forward-only producer of rows
#[async_trait]
pub trait RecordSource: Send {
    /// Column list every emitted row is keyed by
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the source is exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Rows of a database table, read with one bulk `SELECT`
pub struct DatabaseScanReader {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Vec<Option<String>>>,
}

impl DatabaseScanReader {
    /// Select the projected columns of `table` and hold the result. An
    /// unqualified name is looked up in `database`.
    pub async fn open(
        db: &dyn Database,
        database: &str,
        table: &str,
        projection: &Projection,
    ) -> Result<Self> {
        let statement = sql::select_columns(database, table, projection.columns());
        let set = db
            .query_rows(&statement)
            .await
            .map_err(|e| ChflatError::SourceQuery(format!("reading {}: {}", table, e)))?;

        log::info!("Read {} rows from {}", set.len(), table);
        Ok(Self::from_row_set(set))
    }

    pub fn from_row_set(set: RowSet) -> Self {
        Self {
            columns: set.columns.into(),
            rows: set.rows.into_iter(),
        }
    }
}

#[async_trait]
impl RecordSource for DatabaseScanReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self
            .rows
            .next()
            .map(|values| Row::new(Arc::clone(&self.columns), values)))
    }
}

/// Streaming parse of a delimited file.
///
/// Fields are trimmed and blank lines skipped. Each record must have exactly
/// as many fields as there are columns; anything else is a parse error.
pub struct FlatFileReader {
    columns: Arc<[String]>,
    reader: csv::Reader<File>,
    record: csv::StringRecord,
}

impl FlatFileReader {
    /// Open `path` using the columns and header layout found by inference
    pub fn open(path: &Path, inferred: &InferredFile, delimiter: u8) -> Result<Self> {
        let file = File::open(path)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(inferred.has_header())
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        Ok(Self {
            columns: inferred.schema.names().into(),
            reader,
            record: csv::StringRecord::new(),
        })
    }

    fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordSource for FlatFileReader {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            let more = self.reader.read_record(&mut self.record).map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                ChflatError::Parse(format!("line {}: {}", line, e))
            })?;

            if !more {
                return Ok(None);
            }

            // A whitespace-only line parses as one empty field
            if self.record.len() == 1 && self.record[0].is_empty() {
                continue;
            }

            if self.record.len() != self.columns.len() {
                return Err(ChflatError::Parse(format!(
                    "line {}: expected {} fields, found {}",
                    self.line(),
                    self.columns.len(),
                    self.record.len()
                )));
            }

            let values = self.record.iter().map(|f| Some(f.to_string())).collect();
            return Ok(Some(Row::new(Arc::clone(&self.columns), values)));
        }
    }
}
