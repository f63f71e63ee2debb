//! Read-only helpers around the destination database: table listing, column
//! discovery, previews and CSV export.

use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::db::{sql, Database};
use crate::error::{ChflatError, Result};
use crate::ingest::inference::{infer_flat_file, infer_table};
use crate::ingest::schema::ColumnDescriptor;

/// First rows of a table along with its column names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

pub async fn list_tables(db: &dyn Database) -> Result<Vec<String>> {
    db.list_tables()
        .await
        .map_err(|e| ChflatError::SourceUnavailable(format!("listing tables: {}", e)))
}

pub async fn table_columns(db: &dyn Database, table: &str) -> Result<Vec<ColumnDescriptor>> {
    Ok(infer_table(db, table).await?.columns().to_vec())
}

/// Columns of a local delimited file, as ingestion would see them
pub fn file_columns(
    path: &Path,
    file_name: &str,
    config: &Config,
) -> Result<Vec<ColumnDescriptor>> {
    let inferred = infer_flat_file(path, file_name, &config.ingest, &config.known_datasets)?;
    Ok(inferred.schema.columns().to_vec())
}

pub async fn preview(db: &dyn Database, table: &str, limit: usize) -> Result<Preview> {
    let columns = table_columns(db, table).await?;

    let set = db
        .query_rows(&sql::preview(table, limit))
        .await
        .map_err(|e| ChflatError::SourceQuery(format!("previewing {}: {}", table, e)))?;

    Ok(Preview {
        columns: columns.into_iter().map(|c| c.name).collect(),
        rows: set.rows,
    })
}

/// Whole table as CSV, header row first
pub async fn download(db: &dyn Database, table: &str) -> Result<String> {
    let csv = db
        .query_text(&sql::download(table))
        .await
        .map_err(|e| ChflatError::SourceQuery(format!("exporting {}: {}", table, e)))?;

    log::info!("Exported {} bytes from {}", csv.len(), table);
    Ok(csv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDatabase;
    use crate::db::RowSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_tables_sorted() {
        let db = MemoryDatabase::new()
            .with_table("trips", &[("id", "UInt32")])
            .with_table("events", &[("id", "UInt32")]);

        assert_eq!(
            list_tables(&db).await.unwrap(),
            vec!["events".to_string(), "trips".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_tables_unreachable() {
        let db = MemoryDatabase::new().failing_queries();
        let err = list_tables(&db).await.unwrap_err();
        assert!(matches!(err, ChflatError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_table_columns_keep_reported_types() {
        let db = MemoryDatabase::new()
            .with_table("trips", &[("id", "UInt32"), ("pickup", "DateTime")]);

        let columns = table_columns(&db, "trips").await.unwrap();

        assert_eq!(
            columns,
            vec![
                ColumnDescriptor::new("id", "UInt32"),
                ColumnDescriptor::new("pickup", "DateTime"),
            ]
        );
    }

    #[test]
    fn test_file_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, "id,name\n1,a\n").unwrap();

        let columns = file_columns(&path, "people.csv", &Config::default()).unwrap();

        assert_eq!(
            columns,
            vec![ColumnDescriptor::text("id"), ColumnDescriptor::text("name")]
        );
    }

    #[tokio::test]
    async fn test_preview() {
        let set = RowSet {
            columns: vec!["id".to_string()],
            rows: vec![vec![Some("1".to_string())], vec![None]],
        };
        let db = MemoryDatabase::new()
            .with_table("trips", &[("id", "UInt32")])
            .with_scan_result(set);

        let preview = preview(&db, "trips", 5).await.unwrap();

        assert_eq!(preview.columns, vec!["id".to_string()]);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(db.queries(), vec!["SELECT * FROM `trips` LIMIT 5".to_string()]);
    }

    #[tokio::test]
    async fn test_download() {
        let db = MemoryDatabase::new().with_text_result("\"id\"\n1\n2\n");

        let csv = download(&db, "trips").await.unwrap();

        assert_eq!(csv, "\"id\"\n1\n2\n");
        assert_eq!(
            db.queries(),
            vec!["SELECT * FROM `trips` FORMAT CSVWithNames".to_string()]
        );
    }

    #[tokio::test]
    async fn test_download_failure() {
        let db = MemoryDatabase::new().failing_queries();
        let err = download(&db, "trips").await.unwrap_err();
        assert!(matches!(err, ChflatError::SourceQuery(_)));
    }
}
