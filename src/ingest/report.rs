use serde::Serialize;
use std::fmt;

use crate::error::ChflatError;

/// A terminal job error together with the rows already committed before it.
///
/// Batches are not transactional: `rows_written` rows may already sit in the
/// destination table.
#[derive(Debug)]
pub struct JobFailure {
    pub error: ChflatError,
    pub rows_written: u64,
}

impl JobFailure {
    pub fn new(error: ChflatError, rows_written: u64) -> Self {
        Self { error, rows_written }
    }
}

impl From<ChflatError> for JobFailure {
    fn from(error: ChflatError) -> Self {
        Self::new(error, 0)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} rows written before failure)", self.error, self.rows_written)
    }
}

/// Outcome of an ingestion job, shaped for the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IngestReport {
    Success {
        success: bool,
        #[serde(rename = "rowsWritten")]
        rows_written: u64,
        message: String,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(rename = "rowsWrittenBeforeFailure")]
        rows_written_before_failure: u64,
    },
}

impl IngestReport {
    pub fn success(rows_written: u64, destination: &str) -> Self {
        IngestReport::Success {
            success: true,
            rows_written,
            message: format!("Successfully ingested {} rows into {}", rows_written, destination),
        }
    }

    pub fn failure(failure: &JobFailure) -> Self {
        IngestReport::Failure {
            success: false,
            error: failure.error.to_string(),
            rows_written_before_failure: failure.rows_written,
        }
    }

    /// Translate a job outcome; never fails
    pub fn from_outcome(outcome: &std::result::Result<u64, JobFailure>, destination: &str) -> Self {
        match outcome {
            Ok(rows) => Self::success(*rows, destination),
            Err(failure) => Self::failure(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestReport::Success { .. })
    }

    /// Rows committed to the destination, whatever the outcome
    pub fn rows_written(&self) -> u64 {
        match self {
            IngestReport::Success { rows_written, .. } => *rows_written,
            IngestReport::Failure {
                rows_written_before_failure,
                ..
            } => *rows_written_before_failure,
        }
    }
}
