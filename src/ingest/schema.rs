use serde::Serialize;
use std::collections::HashSet;

use crate::db::sql::FALLBACK_TYPE;
use crate::error::{ChflatError, Result};

/// A column name with the type its source declares for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }

    /// Column from a flat file; every such column is typed as `String`
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FALLBACK_TYPE)
    }
}

/// Ordered, duplicate-free list of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
}

impl Schema {
    /// Build a schema, rejecting repeated column names
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ChflatError::InvalidColumn(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Schema of `String` columns with the given names
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(ColumnDescriptor::text).collect())
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keeps_order() {
        let schema = Schema::from_names(["c", "a", "b"]).unwrap();
        assert_eq!(schema.names(), vec!["c", "a", "b"]);
        assert_eq!(schema.get("a").unwrap().declared_type, "String");
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = Schema::from_names(["id", "name", "id"]).unwrap_err();
        assert!(matches!(err, ChflatError::InvalidColumn(_)));
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_schema_serializes_as_name_type_pairs() {
        let schema = Schema::new(vec![ColumnDescriptor::new("id", "UInt64")]).unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json, serde_json::json!([{"name": "id", "type": "UInt64"}]));
    }
}
