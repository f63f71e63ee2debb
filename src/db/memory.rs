//! In-memory `Database` that records every call, for pipeline tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::sql::{CreateTable, InsertStatement, FALLBACK_TYPE};
use super::{Database, RowSet};
use crate::error::{ChflatError, Result};
use crate::ingest::schema::ColumnDescriptor;

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<ColumnDescriptor>>,
    scan_result: RowSet,
    text_result: String,
    execute_rows: u64,
    creates: Vec<CreateTable>,
    inserts: Vec<InsertStatement>,
    insert_calls: usize,
    queries: Vec<String>,
    executed: Vec<String>,
    fail_insert_at: Option<usize>,
    fail_queries: bool,
    fail_create: bool,
    fail_execute: bool,
    fail_exists: bool,
}

pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            columns
                .iter()
                .map(|(n, t)| ColumnDescriptor::new(*n, *t))
                .collect(),
        );
        self
    }

    /// Result every `query_rows` call returns
    pub fn with_scan_result(self, set: RowSet) -> Self {
        self.state.lock().unwrap().scan_result = set;
        self
    }

    /// Body every `query_text` call returns
    pub fn with_text_result(self, text: &str) -> Self {
        self.state.lock().unwrap().text_result = text.to_string();
        self
    }

    /// Row count every `execute` call reports
    pub fn with_execute_rows(self, rows: u64) -> Self {
        self.state.lock().unwrap().execute_rows = rows;
        self
    }

    /// Fail the insert call with this zero-based index
    pub fn fail_insert_at(self, call: usize) -> Self {
        self.state.lock().unwrap().fail_insert_at = Some(call);
        self
    }

    pub fn failing_queries(self) -> Self {
        self.state.lock().unwrap().fail_queries = true;
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    pub fn failing_exists(self) -> Self {
        self.state.lock().unwrap().fail_exists = true;
        self
    }

    pub fn failing_execute(self) -> Self {
        self.state.lock().unwrap().fail_execute = true;
        self
    }

    pub fn creates(&self) -> Vec<CreateTable> {
        self.state.lock().unwrap().creates.clone()
    }

    /// Successful inserts, in call order
    pub fn inserts(&self) -> Vec<InsertStatement> {
        self.state.lock().unwrap().inserts.clone()
    }

    /// Insert calls including the failed one
    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn columns_of(&self, table: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(ChflatError::Database("Connection refused".to_string()));
        }
        let mut names: Vec<String> = state.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| ChflatError::Database(format!("Table {} doesn't exist", table)))
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_exists {
            return Err(ChflatError::Database("Authentication failed".to_string()));
        }
        Ok(state.tables.contains_key(table))
    }

    async fn create_table(&self, create: &CreateTable) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(ChflatError::Database("Not enough privileges".to_string()));
        }
        state.creates.push(create.clone());
        state.tables.insert(
            create.table.clone(),
            create
                .columns
                .iter()
                .map(|c| ColumnDescriptor::new(c.clone(), FALLBACK_TYPE))
                .collect(),
        );
        Ok(())
    }

    async fn query_rows(&self, statement: &str) -> Result<RowSet> {
        let mut state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(ChflatError::Database("Connection refused".to_string()));
        }
        state.queries.push(statement.to_string());
        Ok(state.scan_result.clone())
    }

    async fn query_text(&self, statement: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(ChflatError::Database("Connection refused".to_string()));
        }
        state.queries.push(statement.to_string());
        Ok(state.text_result.clone())
    }

    async fn insert(&self, insert: &InsertStatement) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let call = state.insert_calls;
        state.insert_calls += 1;
        if state.fail_insert_at == Some(call) {
            return Err(ChflatError::Database(format!("simulated failure on insert {}", call)));
        }
        state.inserts.push(insert.clone());
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if state.fail_execute {
            return Err(ChflatError::Database("Memory limit exceeded".to_string()));
        }
        state.executed.push(statement.to_string());
        Ok(state.execute_rows)
    }
}
