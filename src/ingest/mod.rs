pub mod inference;
pub mod projection;
pub mod reader;
pub mod report;
pub mod row;
pub mod schema;
pub mod table;
pub mod writer;

pub use inference::{infer_flat_file, infer_table, InferenceStrategy, InferredFile};
pub use projection::{project, Projection};
pub use reader::{DatabaseScanReader, FlatFileReader, RecordSource};
pub use report::{IngestReport, JobFailure};
pub use row::Row;
pub use schema::{ColumnDescriptor, Schema};
pub use table::{ensure_table, TableStatus};
pub use writer::{transfer_in_database, BatchedWriter};

use std::path::PathBuf;
use uuid::Uuid;

use crate::config::{Config, TransferMode};
use crate::db::Database;
use crate::error::ChflatError;

/// Where an ingestion job reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Database,
    FlatFile,
}

/// An uploaded delimited file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Name the file was uploaded under; drives extension and dataset checks
    pub file_name: String,
    /// Delete `path` once the job ends, whatever the outcome
    pub delete_after: bool,
}

#[derive(Debug, Clone)]
pub enum Source {
    /// A table in the configured database
    Table(String),
    File(SourceFile),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Table(_) => SourceKind::Database,
            Source::File(_) => SourceKind::FlatFile,
        }
    }
}

/// One request to copy selected columns of a source into a destination table
#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub id: Uuid,
    pub source: Source,
    pub selected_columns: Vec<String>,
    pub destination: String,
    /// Overrides `ingest.batch_size` when set
    pub batch_size: Option<usize>,
}

impl IngestionJob {
    pub fn new(
        source: Source,
        selected_columns: Vec<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            selected_columns,
            destination: destination.into(),
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Removes an owned upload when dropped
struct UploadGuard {
    job_id: Uuid,
    path: Option<PathBuf>,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("[{}] Removed upload {}", self.job_id, path.display()),
                Err(e) => log::warn!(
                    "[{}] Failed to remove upload {}: {}",
                    self.job_id,
                    path.display(),
                    e
                ),
            }
        }
    }
}

/// Run a job to completion and translate the outcome. Never fails.
pub async fn run_job(db: &dyn Database, config: &Config, job: IngestionJob) -> IngestReport {
    let _upload = UploadGuard {
        job_id: job.id,
        path: match &job.source {
            Source::File(file) if file.delete_after => Some(file.path.clone()),
            _ => None,
        },
    };

    log::info!(
        "[{}] Ingesting {:?} source into {} ({} columns)",
        job.id,
        job.source.kind(),
        job.destination,
        job.selected_columns.len()
    );

    let outcome = execute(db, config, &job).await;

    match &outcome {
        Ok(rows) => log::info!("[{}] Ingested {} rows into {}", job.id, rows, job.destination),
        Err(failure) => {
            log::error!("[{}] Ingestion into {} failed: {}", job.id, job.destination, failure)
        }
    }

    IngestReport::from_outcome(&outcome, &job.destination)
}

/// Infer, project, ensure the destination, then move the rows
pub async fn execute(
    db: &dyn Database,
    config: &Config,
    job: &IngestionJob,
) -> Result<u64, JobFailure> {
    let ingest = &config.ingest;
    let batch_size = job.batch_size.unwrap_or(ingest.batch_size);
    if batch_size == 0 {
        let message = "batch size must be greater than 0".to_string();
        return Err(ChflatError::InvalidInput(message).into());
    }
    if job.destination.trim().is_empty() {
        let message = "destination table name is empty".to_string();
        return Err(ChflatError::InvalidInput(message).into());
    }

    let destination = job.destination.as_str();
    let verify = ingest.verify_existing_schema;
    let format = ingest.insert_format;

    match &job.source {
        Source::Table(table) => {
            let schema = infer_table(db, table).await?;
            let projection = project(&schema, &job.selected_columns)?;
            ensure_table(db, destination, &projection, verify).await?;

            let database = &config.clickhouse.database;
            match ingest.database_transfer {
                TransferMode::InsertSelect => {
                    transfer_in_database(db, database, table, destination, &projection).await
                }
                TransferMode::Scan => {
                    let mut reader =
                        DatabaseScanReader::open(db, database, table, &projection).await?;
                    BatchedWriter::new(db, destination, &projection, batch_size, format)
                        .write(&mut reader)
                        .await
                }
            }
        }
        Source::File(file) => {
            let inferred =
                infer_flat_file(&file.path, &file.file_name, ingest, &config.known_datasets)?;
            log::info!(
                "[{}] {} columns via {:?}",
                job.id,
                inferred.schema.len(),
                inferred.strategy
            );
            let projection = project(&inferred.schema, &job.selected_columns)?;
            ensure_table(db, destination, &projection, verify).await?;

            let mut reader = FlatFileReader::open(&file.path, &inferred, ingest.delimiter_byte())?;
            BatchedWriter::new(db, destination, &projection, batch_size, format)
                .write(&mut reader)
                .await
        }
    }
}
