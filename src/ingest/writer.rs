use super::projection::Projection;
use super::reader::RecordSource;
use super::report::JobFailure;
use crate::config::InsertFormat;
use crate::db::{sql, Database};
use crate::error::ChflatError;

/// Writes a row stream into a destination table in fixed-size batches.
///
/// Batches go out strictly in stream order; batch N completes before batch
/// N+1 is built. The first failed write stops the job.
pub struct BatchedWriter<'a> {
    db: &'a dyn Database,
    destination: &'a str,
    projection: &'a Projection,
    batch_size: usize,
    format: InsertFormat,
}

impl<'a> BatchedWriter<'a> {
    pub fn new(
        db: &'a dyn Database,
        destination: &'a str,
        projection: &'a Projection,
        batch_size: usize,
        format: InsertFormat,
    ) -> Self {
        Self {
            db,
            destination,
            projection,
            batch_size: batch_size.max(1),
            format,
        }
    }

    /// Drain `source` into the destination, returning the rows written
    pub async fn write(&self, source: &mut dyn RecordSource) -> Result<u64, JobFailure> {
        let indices = self.projection.indices_in(source.columns())?;

        let mut written: u64 = 0;
        let mut batch: Vec<Vec<String>> = Vec::with_capacity(self.batch_size);
        let mut batches = 0usize;

        loop {
            let row = match source.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(JobFailure::new(e, written)),
            };

            batch.push(self.projection.extract(&row, &indices));

            if batch.len() == self.batch_size {
                written += self.flush(&batch, batches, written).await?;
                batches += 1;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            written += self.flush(&batch, batches, written).await?;
            batches += 1;
        }

        log::info!("Wrote {} rows to {} in {} batches", written, self.destination, batches);
        Ok(written)
    }

    async fn flush(
        &self,
        batch: &[Vec<String>],
        index: usize,
        written: u64,
    ) -> Result<u64, JobFailure> {
        let columns = self.projection.columns();
        let insert = sql::render_insert(self.destination, columns, batch, self.format)
            .map_err(|e| JobFailure::new(e, written))?;

        self.db.insert(&insert).await.map_err(|e| {
            log::error!("Batch {} into {} failed: {}", index + 1, self.destination, e);
            JobFailure::new(
                ChflatError::Write(format!("batch {} into {}: {}", index + 1, self.destination, e)),
                written,
            )
        })?;

        log::debug!("Batch {}: {} rows into {}", index + 1, batch.len(), self.destination);
        Ok(batch.len() as u64)
    }
}

/// Copy the projected columns of `source` into `destination` with one
/// server-side `INSERT ... SELECT`. An unqualified source is looked up in
/// `database`.
pub async fn transfer_in_database(
    db: &dyn Database,
    database: &str,
    source: &str,
    destination: &str,
    projection: &Projection,
) -> Result<u64, JobFailure> {
    let statement = sql::insert_select(destination, database, source, projection.columns());
    let written = db
        .execute(&statement)
        .await
        .map_err(|e| ChflatError::Write(format!("copy {} into {}: {}", source, destination, e)))?;

    log::info!("Copied {} rows from {} into {} server-side", written, source, destination);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use crate::db::RowSet;
    use crate::ingest::projection::project;
    use crate::ingest::reader::DatabaseScanReader;
    use crate::ingest::schema::Schema;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// `n` rows over columns a, b, c with values like `a0`, `b0`, `c0`
    fn source(n: usize) -> DatabaseScanReader {
        DatabaseScanReader::from_row_set(RowSet {
            columns: names(&["a", "b", "c"]),
            rows: (0..n)
                .map(|i| {
                    vec![
                        Some(format!("a{}", i)),
                        Some(format!("b{}", i)),
                        Some(format!("c{}", i)),
                    ]
                })
                .collect(),
        })
    }

    fn projection(list: &[&str]) -> Projection {
        let schema = Schema::from_names(["a", "b", "c"]).unwrap();
        project(&schema, &names(list)).unwrap()
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        let cases = [(0, 3, 0), (1, 3, 1), (6, 3, 2), (7, 3, 3), (250, 100, 3)];
        for (rows, batch_size, expected_calls) in cases {
            let db = MemoryDatabase::new();
            let projection = projection(&["a"]);
            let writer =
                BatchedWriter::new(&db, "dst", &projection, batch_size, InsertFormat::JsonEachRow);

            let written = writer.write(&mut source(rows)).await.unwrap();

            assert_eq!(written, rows as u64);
            assert_eq!(db.insert_calls(), expected_calls, "rows={} batch={}", rows, batch_size);
            let total: usize = db.inserts().iter().map(|i| i.row_count).sum();
            assert_eq!(total, rows);
        }
    }

    #[tokio::test]
    async fn test_rows_follow_projection_order() {
        let db = MemoryDatabase::new();
        let projection = projection(&["b", "a"]);
        let writer = BatchedWriter::new(&db, "dst", &projection, 10, InsertFormat::JsonEachRow);

        writer.write(&mut source(2)).await.unwrap();

        let inserts = db.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].query, "INSERT INTO `dst` (`b`, `a`) FORMAT JSONEachRow");
        assert_eq!(
            inserts[0].body.as_deref(),
            Some("{\"b\":\"b0\",\"a\":\"a0\"}\n{\"b\":\"b1\",\"a\":\"a1\"}\n")
        );
    }

    #[tokio::test]
    async fn test_absent_values_become_empty_strings() {
        let db = MemoryDatabase::new();
        let projection = projection(&["a", "c"]);
        let writer = BatchedWriter::new(&db, "dst", &projection, 10, InsertFormat::Values);
        let mut rows = DatabaseScanReader::from_row_set(RowSet {
            columns: names(&["a", "b", "c"]),
            rows: vec![vec![Some("x".to_string()), None, None]],
        });

        writer.write(&mut rows).await.unwrap();

        assert_eq!(
            db.inserts()[0].query,
            "INSERT INTO `dst` (`a`, `c`) VALUES ('x', '')"
        );
    }

    #[tokio::test]
    async fn test_failure_reports_committed_prefix() {
        // Third batch fails: two full batches of 4 are already committed
        let db = MemoryDatabase::new().fail_insert_at(2);
        let projection = projection(&["a", "b"]);
        let writer = BatchedWriter::new(&db, "dst", &projection, 4, InsertFormat::JsonEachRow);

        let failure = writer.write(&mut source(20)).await.unwrap_err();

        assert!(matches!(failure.error, ChflatError::Write(_)));
        assert_eq!(failure.rows_written, 8);
        assert_eq!(db.insert_calls(), 3);
        assert_eq!(db.inserts().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_on_trailing_partial_batch() {
        // 10 rows, batch 4: calls are 4, 4, 2; the final flush fails
        let db = MemoryDatabase::new().fail_insert_at(2);
        let projection = projection(&["a"]);
        let writer = BatchedWriter::new(&db, "dst", &projection, 4, InsertFormat::JsonEachRow);

        let failure = writer.write(&mut source(10)).await.unwrap_err();

        assert_eq!(failure.rows_written, 8);
        assert_eq!(db.insert_calls(), 3);
    }

    #[tokio::test]
    async fn test_projection_missing_from_source_fails_before_writing() {
        let db = MemoryDatabase::new();
        let schema = Schema::from_names(["a", "z"]).unwrap();
        let projection = project(&schema, &names(&["z"])).unwrap();
        let writer = BatchedWriter::new(&db, "dst", &projection, 4, InsertFormat::JsonEachRow);

        let failure = writer.write(&mut source(3)).await.unwrap_err();

        assert!(matches!(failure.error, ChflatError::InvalidColumn(_)));
        assert_eq!(failure.rows_written, 0);
        assert_eq!(db.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_transfer_in_database() {
        let db = MemoryDatabase::new().with_execute_rows(42);
        let projection = projection(&["c", "a"]);

        let written = transfer_in_database(&db, "default", "src", "dst", &projection)
            .await
            .unwrap();

        assert_eq!(written, 42);
        assert_eq!(
            db.executed(),
            vec!["INSERT INTO `dst` (`c`, `a`) SELECT `c`, `a` FROM `default`.`src`".to_string()]
        );
    }

    #[tokio::test]
    async fn test_transfer_from_qualified_source() {
        let db = MemoryDatabase::new().with_execute_rows(3);
        let projection = projection(&["a"]);

        transfer_in_database(&db, "default", "raw.events", "dst", &projection)
            .await
            .unwrap();

        assert_eq!(
            db.executed(),
            vec!["INSERT INTO `dst` (`a`) SELECT `a` FROM `raw`.`events`".to_string()]
        );
    }

    #[tokio::test]
    async fn test_transfer_in_database_failure_is_write_error() {
        let db = MemoryDatabase::new().failing_execute();
        let projection = projection(&["a"]);

        let failure = transfer_in_database(&db, "default", "src", "dst", &projection)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ChflatError::Write(_)));
        assert_eq!(failure.rows_written, 0);
    }
}
