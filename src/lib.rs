pub mod browse;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;

pub use config::Config;
pub use db::{ClickHouse, Database};
pub use error::{ChflatError, Result};
pub use ingest::{run_job, IngestReport, IngestionJob, Source, SourceFile};
