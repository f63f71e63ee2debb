//! Column discovery for database tables and uploaded delimited files.
//!
//! Flat files go through one of three strategies:
//! - a known dataset (file name matches a configured marker) gets its fixed column list;
//! - otherwise the first record is read as a header;
//! - when the sniff window holds no complete first record, that record's field
//!   count is used and columns are named `column_1..column_N`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::schema::{ColumnDescriptor, Schema};
use crate::config::{match_known_dataset, IngestConfig, KnownDataset};
use crate::db::Database;
use crate::error::{ChflatError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How the columns of a flat file were determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceStrategy {
    /// Fixed columns of the named known dataset
    KnownDataset(String),
    /// Names read from the header line
    HeaderSniff,
    /// Synthesized `column_N` names from the first record's field count
    FieldCount,
}

/// Result of flat-file inference
#[derive(Debug, Clone)]
pub struct InferredFile {
    pub schema: Schema,
    pub strategy: InferenceStrategy,
}

impl InferredFile {
    /// Whether the first record of the file is a header, not data
    pub fn has_header(&self) -> bool {
        self.strategy == InferenceStrategy::HeaderSniff
    }
}

/// Columns of a database table, with the types the server reports
pub async fn infer_table(db: &dyn Database, table: &str) -> Result<Schema> {
    let columns = db.describe_table(table).await.map_err(|e| {
        ChflatError::SourceUnavailable(format!("cannot describe table {}: {}", table, e))
    })?;

    if columns.is_empty() {
        return Err(ChflatError::SourceUnavailable(format!(
            "table {} reported no columns",
            table
        )));
    }

    Schema::new(columns)
}

/// Lowercased extension of `file_name` if it is one of `accepted`
pub fn check_extension(file_name: &str, accepted: &[String]) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    if accepted.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension)) {
        Ok(extension)
    } else {
        Err(ChflatError::UnsupportedFormat(format!(
            "{} (accepted: {})",
            file_name,
            accepted.join(", ")
        )))
    }
}

/// Infer the columns of the file at `path`, uploaded as `file_name`
pub fn infer_flat_file(
    path: &Path,
    file_name: &str,
    config: &IngestConfig,
    known_datasets: &[KnownDataset],
) -> Result<InferredFile> {
    check_extension(file_name, &config.accepted_extensions)?;

    if let Some(dataset) = match_known_dataset(known_datasets, file_name) {
        log::info!(
            "{} matches known dataset '{}', using its {} fixed columns",
            file_name,
            dataset.name,
            dataset.columns.len()
        );
        return Ok(InferredFile {
            schema: Schema::from_names(dataset.columns.iter().cloned())?,
            strategy: InferenceStrategy::KnownDataset(dataset.name.clone()),
        });
    }

    let delimiter = config.delimiter_byte();

    if let Some(names) = sniff_header(path, config.sniff_bytes, delimiter)? {
        log::debug!("Header of {}: {:?}", file_name, names);
        return Ok(InferredFile {
            schema: Schema::from_names(names)?,
            strategy: InferenceStrategy::HeaderSniff,
        });
    }

    let count = first_record_width(path, delimiter)?;
    log::info!(
        "No header line found in {}, naming {} columns by position",
        file_name,
        count
    );
    Ok(InferredFile {
        schema: Schema::new(
            (1..=count)
                .map(|i| ColumnDescriptor::text(format!("column_{}", i)))
                .collect(),
        )?,
        strategy: InferenceStrategy::FieldCount,
    })
}

/// Trimmed names of the first record, provided that record ends with a line
/// terminator inside the first `window` bytes. Quoted fields may span lines.
fn sniff_header(path: &Path, window: usize, delimiter: u8) -> Result<Option<Vec<String>>> {
    let file = File::open(path)?;
    let mut buf = Vec::with_capacity(window.min(64 * 1024));
    file.take(window as u64).read_to_end(&mut buf)?;
    let data = buf.strip_prefix(UTF8_BOM).unwrap_or(&buf);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let mut record = csv::ByteRecord::new();
    let found = reader
        .read_byte_record(&mut record)
        .map_err(|e| ChflatError::Parse(format!("header line: {}", e)))?;
    if !found {
        return Ok(None);
    }

    let end = reader.position().byte() as usize;
    let terminated = data
        .get(..end)
        .and_then(|consumed| consumed.last())
        .is_some_and(|b| *b == b'\n' || *b == b'\r');
    if !terminated {
        return Ok(None);
    }

    let names: Vec<String> = record
        .iter()
        .map(|f| String::from_utf8_lossy(f).trim().to_string())
        .collect();
    if names.iter().all(|n| n.is_empty()) {
        return Ok(None);
    }
    Ok(Some(names))
}

/// Field count of the first record in the file, 0 for an empty file
fn first_record_width(path: &Path, delimiter: u8) -> Result<usize> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Ok(record.len()),
        Ok(false) => Ok(0),
        Err(e) => Err(ChflatError::Parse(format!("line 1: {}", e))),
    }
}
