#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::{TableId, TargetSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_UPLOAD_BASE: &str = "https://bigquery.googleapis.com/upload";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Connection parameters for the source database.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl SourceSettings {
    /// Reads `PG_HOST`, `PG_PORT`, `PG_DATABASE`, `PG_USER` and `PG_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            var(key).ok_or_else(|| EtlError::MissingConfigError {
                field: key.to_string(),
            })
        };

        let port = match var("PG_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| EtlError::InvalidConfigValueError {
                    field: "PG_PORT".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_PG_PORT,
        };

        Ok(Self {
            host: required("PG_HOST")?,
            port,
            database: required("PG_DATABASE")?,
            user: required("PG_USER")?,
            password: required("PG_PASSWORD")?,
        })
    }
}

impl fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Validate for SourceSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("PG_HOST", &self.host)?;
        validation::validate_range("PG_PORT", self.port, 1, u16::MAX)?;
        validation::validate_non_empty_string("PG_DATABASE", &self.database)?;
        validation::validate_non_empty_string("PG_USER", &self.user)?;
        Ok(())
    }
}

/// Where and how to reach the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseSettings {
    pub credentials_path: PathBuf,
    pub api_base: String,
    pub upload_base: String,
    pub poll_interval: Duration,
}

impl WarehouseSettings {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Reads `CREDENTIALS_PATH` plus the optional `BIGQUERY_API_BASE`,
    /// `BIGQUERY_UPLOAD_BASE` and `BIGQUERY_POLL_INTERVAL_MS` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials_path = var("CREDENTIALS_PATH").ok_or_else(|| {
            EtlError::MissingConfigError {
                field: "CREDENTIALS_PATH".to_string(),
            }
        })?;

        let mut settings = Self::new(credentials_path);
        if let Some(api_base) = var("BIGQUERY_API_BASE") {
            settings.api_base = api_base;
        }
        if let Some(upload_base) = var("BIGQUERY_UPLOAD_BASE") {
            settings.upload_base = upload_base;
        }
        if let Some(raw) = var("BIGQUERY_POLL_INTERVAL_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| EtlError::InvalidConfigValueError {
                    field: "BIGQUERY_POLL_INTERVAL_MS".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            settings.poll_interval = Duration::from_millis(millis);
        }
        Ok(settings)
    }
}

impl Validate for WarehouseSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_path(
            "CREDENTIALS_PATH",
            &self.credentials_path.to_string_lossy(),
        )?;
        validation::validate_url("BIGQUERY_API_BASE", &self.api_base)?;
        validation::validate_url("BIGQUERY_UPLOAD_BASE", &self.upload_base)?;
        validation::validate_range(
            "BIGQUERY_POLL_INTERVAL_MS",
            self.poll_interval.as_millis() as u64,
            10,
            60_000,
        )?;
        Ok(())
    }
}

/// What the orchestrator does when the validator reports issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Log the report and load anyway.
    #[default]
    Proceed,
    /// Stop before loading and return the report as an error.
    Abort,
}

/// One batch: which rows to read, how to shape them and where to put them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub query: String,
    pub table_id: String,
    pub target: TargetSchema,
    pub timezone: String,
    pub on_validation_failure: ValidationPolicy,
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("source.query", &self.query)?;
        validation::validate_non_empty_string("transform.timezone", &self.timezone)?;
        if self.target.is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "transform.required_columns".to_string(),
                value: String::new(),
                reason: "At least one target column is required".to_string(),
            });
        }
        for column in self.target.iter() {
            validation::validate_non_empty_string("transform.required_columns", column)?;
        }
        TableId::parse(&self.table_id).map_err(|_| EtlError::InvalidConfigValueError {
            field: "load.table_id".to_string(),
            value: self.table_id.clone(),
            reason: "Expected project.dataset.table".to_string(),
        })?;
        Ok(())
    }
}

/// Everything a pipeline run needs, assembled once at start-up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline_name: String,
    pub source: SourceSettings,
    pub warehouse: WarehouseSettings,
    pub job: JobConfig,
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.warehouse.validate()?;
        self.job.validate()?;
        tracing::debug!("Configuration for '{}' validated", self.pipeline_name);
        Ok(())
    }
}
