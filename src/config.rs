// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use crate::process::normalize::NormalizeOptions;

const DEFAULT_LINK_PATTERN: &str = "docs.google.com/spreadsheets";
const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
    #[error("delay_between_batches must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),
    #[error("header_row is 1-based and must be at least 1")]
    ZeroHeaderRow,
    #[error("data_start ({data_start}) must not point above the header row ({header_row})")]
    DataBeforeHeader { header_row: usize, data_start: usize },
    #[error("either `database_url` or a `mysql` section is required")]
    MissingDatabase,
    #[error("invalid database settings: {0}")]
    InvalidDatabase(String),
}

/// MySQL connection parameters, as they appear under the `mysql` key.
#[derive(Debug, Clone, Deserialize)]
pub struct MysqlConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl_ca: Option<PathBuf>,
    #[serde(default)]
    pub ssl_disabled: bool,
}

impl MysqlConfig {
    /// Build a `mysql://` connection URL with credentials percent-encoded.
    pub fn to_url(&self) -> Result<String, ConfigError> {
        let mut url = Url::parse("mysql://localhost")
            .map_err(|e| ConfigError::InvalidDatabase(e.to_string()))?;
        url.set_host(Some(&self.host))
            .map_err(|e| ConfigError::InvalidDatabase(format!("host {:?}: {}", self.host, e)))?;
        url.set_port(Some(self.port))
            .map_err(|_| ConfigError::InvalidDatabase("port".into()))?;
        url.set_username(&self.user)
            .map_err(|_| ConfigError::InvalidDatabase("user".into()))?;
        url.set_password(Some(&self.password))
            .map_err(|_| ConfigError::InvalidDatabase("password".into()))?;
        url.set_path(&self.database);

        {
            let mut query = url.query_pairs_mut();
            if self.ssl_disabled {
                query.append_pair("ssl-mode", "DISABLED");
            } else if let Some(ca) = &self.ssl_ca {
                query.append_pair("ssl-mode", "VERIFY_CA");
                query.append_pair("ssl-ca", &ca.to_string_lossy());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.to_string())
    }
}

/// Everything a run needs, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub page_url: String,
    #[serde(default = "default_link_pattern")]
    pub link_pattern: String,

    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default = "default_column_window")]
    pub column_window: usize,
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default = "default_data_start")]
    pub data_start: usize,
    #[serde(default = "default_true")]
    pub require_all_columns: bool,

    pub batch_size: usize,
    /// Seconds to pause after each batch.
    pub delay_between_batches: f64,

    pub google_sheets_credentials: PathBuf,
    #[serde(default)]
    pub email_domain: Option<String>,

    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub mysql: Option<MysqlConfig>,
}

fn default_link_pattern() -> String {
    DEFAULT_LINK_PATTERN.to_string()
}
fn default_column_window() -> usize {
    9
}
fn default_header_row() -> usize {
    9
}
fn default_data_start() -> usize {
    9
}
fn default_true() -> bool {
    true
}
fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

impl Config {
    /// Read and validate a config file. `.yaml`/`.yml` are parsed as YAML,
    /// anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let cfg: Config = if is_yaml {
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML config {}", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON config {}", path.display()))?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.delay_between_batches.is_finite() || self.delay_between_batches < 0.0 {
            return Err(ConfigError::InvalidDelay(self.delay_between_batches));
        }
        if self.header_row == 0 {
            return Err(ConfigError::ZeroHeaderRow);
        }
        // header_row is 1-based, data_start 0-based: equal values mean the
        // line right after the header.
        if self.data_start < self.header_row {
            return Err(ConfigError::DataBeforeHeader {
                header_row: self.header_row,
                data_start: self.data_start,
            });
        }
        if self.database_url.is_none() && self.mysql.is_none() {
            return Err(ConfigError::MissingDatabase);
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_batches)
    }

    /// `database_url` wins over the `mysql` section.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        match (&self.database_url, &self.mysql) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(mysql)) => mysql.to_url(),
            (None, None) => Err(ConfigError::MissingDatabase),
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            header_row: self.header_row,
            data_start: self.data_start,
            column_window: self.column_window,
            required_columns: self.required_columns.clone(),
            require_all_columns: self.require_all_columns,
        }
    }
}
