use std::sync::Arc;

/// One source record: values keyed by a column list shared across the stream.
///
/// Rows from a table scan and rows from a file parse have the same shape,
/// so the writer never needs to know where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// `values` is positional against `columns`; missing trailing values read as absent.
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        debug_assert!(values.len() <= columns.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn value_at(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Value of `column`; `None` both for an absent value and an unknown column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.value_at(idx))
    }
}
