use super::row::Row;
use super::schema::Schema;
use crate::error::{ChflatError, Result};

/// Ordered subset of columns carried from source to destination.
///
/// The order is the caller's selection order. DDL, insert column lists and
/// per-row value extraction all use it, so they cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    columns: Vec<String>,
}

/// Project `selected` out of `schema`, keeping the caller's order.
///
/// Fails with `InvalidColumn` on the first name the schema lacks. A name
/// selected twice stays twice.
pub fn project(schema: &Schema, selected: &[String]) -> Result<Projection> {
    if selected.is_empty() {
        return Err(ChflatError::InvalidInput("no columns selected".to_string()));
    }

    for name in selected {
        if !schema.contains(name) {
            return Err(ChflatError::InvalidColumn(format!(
                "'{}' is not a column of the source (available: {})",
                name,
                schema.names().join(", ")
            )));
        }
    }

    Ok(Projection {
        columns: selected.to_vec(),
    })
}

impl Projection {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of each projected column within `source_columns`
    pub fn indices_in(&self, source_columns: &[String]) -> Result<Vec<usize>> {
        self.columns
            .iter()
            .map(|name| {
                source_columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| {
                        ChflatError::InvalidColumn(format!(
                            "'{}' is missing from the source rows",
                            name
                        ))
                    })
            })
            .collect()
    }

    /// Values of `row` at `indices`, absent values as empty strings
    pub fn extract(&self, row: &Row, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&idx| row.value_at(idx).unwrap_or_default().to_string())
            .collect()
    }
}
