use anyhow::{Context, Result};
use chflat::browse;
use chflat::{run_job, ClickHouse, Config, IngestionJob, Source, SourceFile};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "chflat")]
#[command(about = "Move ClickHouse tables and delimited files into ClickHouse tables")]
struct Args {
    /// Config file (defaults to $CHFLAT_CONFIG, then ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables in the configured database
    Tables,

    /// Show the columns of a table, or of a local delimited file
    Columns {
        /// Table name
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        table: Option<String>,

        /// Path to a delimited file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show the first rows of a table
    Preview {
        table: String,

        /// Number of rows (defaults to ingest.preview_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export a table as CSV with a header row
    Download {
        table: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy selected columns of a table or file into a destination table
    Ingest {
        /// Source table in the configured database
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        table: Option<String>,

        /// Source delimited file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Columns to carry over, in destination order (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Destination table
        #[arg(long)]
        into: String,

        /// Rows per insert (defaults to ingest.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Delete the source file once the job ends
        #[arg(long, requires = "file")]
        delete_file: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::from_path(path)?
        }
        None => Config::load()?,
    };
    log::info!("Configuration loaded, ClickHouse at {}", config.clickhouse.url());

    match args.command {
        Command::Tables => {
            let db = ClickHouse::new(&config.clickhouse)?;
            print_json(&browse::list_tables(&db).await?)?;
        }
        Command::Columns { table, file } => {
            let columns = match (table, file) {
                (Some(table), _) => {
                    let db = ClickHouse::new(&config.clickhouse)?;
                    browse::table_columns(&db, &table).await?
                }
                (None, Some(file)) => browse::file_columns(&file, &file_name_of(&file), &config)?,
                (None, None) => anyhow::bail!("either --table or --file is required"),
            };
            print_json(&columns)?;
        }
        Command::Preview { table, limit } => {
            let db = ClickHouse::new(&config.clickhouse)?;
            let limit = limit.unwrap_or(config.ingest.preview_limit);
            print_json(&browse::preview(&db, &table, limit).await?)?;
        }
        Command::Download { table, output } => {
            let db = ClickHouse::new(&config.clickhouse)?;
            let csv = browse::download(&db, &table).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Saved {} to {}", table, path.display());
                }
                None => print!("{}", csv),
            }
        }
        Command::Ingest {
            table,
            file,
            columns,
            into,
            batch_size,
            delete_file,
        } => {
            let source = match (table, file) {
                (Some(table), _) => Source::Table(table),
                (None, Some(path)) => Source::File(SourceFile {
                    file_name: file_name_of(&path),
                    path,
                    delete_after: delete_file,
                }),
                (None, None) => anyhow::bail!("either --table or --file is required"),
            };

            let mut job = IngestionJob::new(source, columns, into);
            if let Some(batch_size) = batch_size {
                job = job.with_batch_size(batch_size);
            }

            let report = {
                let db = ClickHouse::new(&config.clickhouse)?;
                run_job(&db, &config, job).await
            };
            print_json(&report)?;

            if !report.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
