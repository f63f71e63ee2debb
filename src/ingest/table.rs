use super::projection::Projection;
use crate::db::{sql, Database};
use crate::error::{ChflatError, Result};

/// What `ensure_table` found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    Existing,
}

/// Make sure `destination` exists with the projected columns.
///
/// An absent table is created with one `String` column per projected name in
/// projection order. An existing table is left alone; when `verify` is set it
/// must carry every projected column.
pub async fn ensure_table(
    db: &dyn Database,
    destination: &str,
    projection: &Projection,
    verify: bool,
) -> Result<TableStatus> {
    let exists = db
        .table_exists(destination)
        .await
        .map_err(|e| ChflatError::Ddl(format!("existence check for {}: {}", destination, e)))?;

    if !exists {
        let create = sql::create_table(destination, projection.columns());
        log::debug!("{}", create.statement);
        db.create_table(&create)
            .await
            .map_err(|e| ChflatError::Ddl(format!("creating {}: {}", destination, e)))?;
        log::info!("Created table {} with {} columns", destination, projection.len());
        return Ok(TableStatus::Created);
    }

    if verify {
        let existing = db
            .describe_table(destination)
            .await
            .map_err(|e| ChflatError::Ddl(format!("describing {}: {}", destination, e)))?;

        let mut missing: Vec<&str> = Vec::new();
        for column in projection.columns() {
            let present = existing.iter().any(|c| &c.name == column);
            if !present && !missing.contains(&column.as_str()) {
                missing.push(column);
            }
        }

        if !missing.is_empty() {
            return Err(ChflatError::SchemaMismatch(format!(
                "table {} has no column(s) {}",
                destination,
                missing.join(", ")
            )));
        }
    }

    log::info!("Table {} already present", destination);
    Ok(TableStatus::Existing)
}
