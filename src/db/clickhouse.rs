use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::sql::{quote_table, CreateTable, InsertStatement};
use super::{Database, RowSet};
use crate::config::ClickHouseConfig;
use crate::error::{ChflatError, Result};
use crate::ingest::schema::ColumnDescriptor;

const SUMMARY_HEADER: &str = "X-ClickHouse-Summary";

/// Row of `DESCRIBE TABLE ... FORMAT JSONEachRow`
#[derive(Debug, Deserialize)]
struct DescribeRow {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

/// Row of `SHOW TABLES FORMAT JSONEachRow`
#[derive(Debug, Deserialize)]
struct TableRow {
    name: String,
}

/// Row of `EXISTS TABLE ... FORMAT JSONEachRow`
#[derive(Debug, Deserialize)]
struct ExistsRow {
    result: Value,
}

/// ClickHouse client over the HTTP interface
///
/// One instance is one logical connection: build it when a job starts and
/// drop it when the job ends.
pub struct ClickHouse {
    client: Client,
    base_url: Url,
    database: String,
    user: String,
    password: String,
}

impl ClickHouse {
    /// Create a client, reading the password from `config.password_env`.
    /// An unset variable means an empty password.
    pub fn new(config: &ClickHouseConfig) -> Result<Self> {
        let password = std::env::var(&config.password_env).unwrap_or_default();
        Self::with_password(config, password)
    }

    /// Create a client with an explicit password or JWT
    pub fn with_password(config: &ClickHouseConfig, password: String) -> Result<Self> {
        let base_url = Url::parse(&config.url()).map_err(|e| {
            ChflatError::Config(format!("Invalid ClickHouse URL {}: {}", config.url(), e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        log::debug!("ClickHouse client for {} (database {})", base_url, config.database);

        Ok(Self {
            client,
            base_url,
            database: config.database.clone(),
            user: config.user.clone(),
            password,
        })
    }

    /// Database the connection runs in
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Base URL, plus the statement as the `query` parameter when the body carries data
    fn endpoint(&self, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Some(query) = query {
            url.query_pairs_mut().append_pair("query", query);
        }
        url
    }

    async fn post(&self, url: Url, body: String) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .header("X-ClickHouse-Database", &self.database)
            .body(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(ChflatError::Database(format!(
                "ClickHouse error {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(response)
    }

    async fn fetch_text(&self, statement: &str) -> Result<String> {
        let response = self.post(self.endpoint(None), statement.to_string()).await?;
        Ok(response.text().await?)
    }

    /// Send a statement and report how many rows the server wrote
    async fn post_counting(&self, url: Url, body: String) -> Result<u64> {
        let response = self.post(url, body).await?;
        let written = response
            .headers()
            .get(SUMMARY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(parse_written_rows)
            .unwrap_or(0);
        // Drain so the server sees the request complete
        response.bytes().await?;
        Ok(written)
    }
}

#[async_trait]
impl Database for ClickHouse {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let body = self.fetch_text("SHOW TABLES FORMAT JSONEachRow").await?;
        let rows: Vec<TableRow> = parse_json_each_row(&body)?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let statement = format!("DESCRIBE TABLE {} FORMAT JSONEachRow", quote_table(table));
        let body = self.fetch_text(&statement).await?;
        let rows: Vec<DescribeRow> = parse_json_each_row(&body)?;
        Ok(rows
            .into_iter()
            .map(|r| ColumnDescriptor::new(r.name, r.column_type))
            .collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let statement = format!("EXISTS TABLE {} FORMAT JSONEachRow", quote_table(table));
        let body = self.fetch_text(&statement).await?;
        let rows: Vec<ExistsRow> = parse_json_each_row(&body)?;
        Ok(rows.first().map(|r| truthy(&r.result)).unwrap_or(false))
    }

    async fn create_table(&self, create: &CreateTable) -> Result<()> {
        self.post_counting(self.endpoint(None), create.statement.clone())
            .await?;
        Ok(())
    }

    async fn query_rows(&self, statement: &str) -> Result<RowSet> {
        let statement = format!("{} FORMAT JSONCompactEachRowWithNames", statement);
        let body = self.fetch_text(&statement).await?;
        parse_compact_with_names(&body)
    }

    async fn query_text(&self, statement: &str) -> Result<String> {
        self.fetch_text(statement).await
    }

    async fn insert(&self, insert: &InsertStatement) -> Result<()> {
        match &insert.body {
            Some(body) => {
                self.post_counting(self.endpoint(Some(&insert.query)), body.clone())
                    .await?
            }
            None => {
                self.post_counting(self.endpoint(None), insert.query.clone())
                    .await?
            }
        };
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        self.post_counting(self.endpoint(None), statement.to_string())
            .await
    }
}

/// Parse newline-delimited JSON objects
fn parse_json_each_row<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| ChflatError::Database(format!("Failed to parse response row: {}", e)))
        })
        .collect()
}

/// Parse `JSONCompactEachRowWithNames`: a header array, then one array per row
fn parse_compact_with_names(body: &str) -> Result<RowSet> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());

    let columns: Vec<String> = match lines.next() {
        Some(header) => serde_json::from_str(header)
            .map_err(|e| ChflatError::Database(format!("Failed to parse column names: {}", e)))?,
        None => return Ok(RowSet::default()),
    };

    let mut rows = Vec::new();
    for line in lines {
        let values: Vec<Value> = serde_json::from_str(line)
            .map_err(|e| ChflatError::Database(format!("Failed to parse response row: {}", e)))?;
        rows.push(values.into_iter().map(value_to_text).collect());
    }

    Ok(RowSet { columns, rows })
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => s != "0" && !s.is_empty(),
        Value::Bool(b) => *b,
        _ => false,
    }
}

/// `written_rows` from the summary header; ClickHouse sends counters as strings
fn parse_written_rows(summary: &str) -> u64 {
    serde_json::from_str::<Value>(summary)
        .ok()
        .and_then(|v| match v.get("written_rows") {
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        })
        .unwrap_or(0)
}
