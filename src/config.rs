use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default = "default_known_datasets")]
    pub known_datasets: Vec<KnownDataset>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clickhouse: ClickHouseConfig::default(),
            ingest: IngestConfig::default(),
            known_datasets: default_known_datasets(),
        }
    }
}

/// Connection settings for the ClickHouse HTTP interface
#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    /// Name of the environment variable holding the password or JWT.
    /// An unset variable means an empty password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password_env: default_password_env(),
            secure: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClickHouseConfig {
    /// Base URL of the ClickHouse HTTP interface
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

/// How a batch of rows is shipped to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertFormat {
    /// Structured insert: statement in the URL, one JSON object per row in the body
    #[default]
    JsonEachRow,
    /// Single textual `INSERT ... VALUES` statement with escaped literals
    Values,
}

/// Strategy for database-to-database ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// One server-side `INSERT ... SELECT`
    #[default]
    InsertSelect,
    /// Read the source table and push it through the batched writer
    Scan,
}

/// Ingestion pipeline tuning
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub insert_format: InsertFormat,
    #[serde(default)]
    pub database_transfer: TransferMode,
    /// Check that an existing destination table has every projected column
    #[serde(default = "default_verify_existing_schema")]
    pub verify_existing_schema: bool,
    /// Bytes read from a flat file when looking for its header line
    #[serde(default = "default_sniff_bytes")]
    pub sniff_bytes: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            insert_format: InsertFormat::default(),
            database_transfer: TransferMode::default(),
            verify_existing_schema: default_verify_existing_schema(),
            sniff_bytes: default_sniff_bytes(),
            delimiter: default_delimiter(),
            accepted_extensions: default_accepted_extensions(),
            preview_limit: default_preview_limit(),
        }
    }
}

impl IngestConfig {
    /// Field delimiter as a single byte. Falls back to `,` when the
    /// configured value is not one ASCII byte (rejected by validation).
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => b',',
        }
    }
}

/// A file-name heuristic that selects a fixed schema instead of header sniffing
#[derive(Debug, Clone, Deserialize)]
pub struct KnownDataset {
    pub name: String,
    /// Case-insensitive substrings matched against the uploaded file name
    pub markers: Vec<String>,
    /// Canonical column list, in file order
    pub columns: Vec<String>,
}

impl KnownDataset {
    /// Whether `file_name` contains one of this dataset's markers
    pub fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        self.markers
            .iter()
            .filter(|m| !m.is_empty())
            .any(|m| name.contains(&m.to_lowercase()))
    }
}

/// First known dataset whose markers match `file_name`
pub fn match_known_dataset<'a>(
    datasets: &'a [KnownDataset],
    file_name: &str,
) -> Option<&'a KnownDataset> {
    datasets.iter().find(|d| d.matches(file_name))
}

/// UK Land Registry price-paid columns; those files ship without a header row.
pub const UK_PRICE_PAID_COLUMNS: &[&str] = &[
    "transaction_id",
    "price",
    "date_of_transfer",
    "postcode",
    "property_type",
    "old_new",
    "duration",
    "paon",
    "saon",
    "street",
    "locality",
    "town_city",
    "district",
    "county",
    "ppd_category_type",
    "record_status",
];

fn default_known_datasets() -> Vec<KnownDataset> {
    vec![KnownDataset {
        name: "uk_price_paid".to_string(),
        markers: vec!["pp-".to_string(), "price-paid".to_string()],
        columns: UK_PRICE_PAID_COLUMNS.iter().map(|c| c.to_string()).collect(),
    }]
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8123
}

fn default_database() -> String {
    "default".to_string()
}

fn default_user() -> String {
    "default".to_string()
}

fn default_password_env() -> String {
    "CLICKHOUSE_PASSWORD".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_verify_existing_schema() -> bool {
    true
}

fn default_sniff_bytes() -> usize {
    64 * 1024
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["csv".to_string(), "txt".to_string()]
}

fn default_preview_limit() -> usize {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CHFLAT_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CHFLAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_path(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.clickhouse.host.trim().is_empty() {
            anyhow::bail!("clickhouse.host must not be empty");
        }

        if self.clickhouse.port == 0 {
            anyhow::bail!("clickhouse.port must be greater than 0");
        }

        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be greater than 0");
        }

        if self.ingest.sniff_bytes == 0 {
            anyhow::bail!("ingest.sniff_bytes must be greater than 0");
        }

        if !matches!(self.ingest.delimiter.as_bytes(), [b] if b.is_ascii()) {
            anyhow::bail!(
                "ingest.delimiter must be a single ASCII character, got {:?}",
                self.ingest.delimiter
            );
        }

        if self.ingest.accepted_extensions.is_empty() {
            anyhow::bail!("ingest.accepted_extensions must list at least one extension");
        }

        for dataset in &self.known_datasets {
            if !dataset.markers.iter().any(|m| !m.trim().is_empty()) {
                anyhow::bail!(
                    "known dataset '{}' needs at least one non-empty marker",
                    dataset.name
                );
            }
            if dataset.columns.is_empty() {
                anyhow::bail!("known dataset '{}' has no columns", dataset.name);
            }
            let mut seen = std::collections::HashSet::new();
            for column in &dataset.columns {
                if !seen.insert(column.as_str()) {
                    anyhow::bail!(
                        "known dataset '{}' lists column '{}' twice",
                        dataset.name,
                        column
                    );
                }
            }
        }

        Ok(())
    }
}
