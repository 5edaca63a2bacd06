use crate::config::{AppConfig, JobConfig, SourceSettings, ValidationPolicy, WarehouseSettings};
use crate::core::transform::DEFAULT_TIMEZONE;
use crate::core::TargetSchema;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub validation: Option<ValidationConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

/// Connection fields left out fall back to the `PG_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub query: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub required_columns: Vec<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub table_id: String,
    pub credentials_path: Option<String>,
    pub api_base: Option<String>,
    pub upload_base: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub on_failure: Option<ValidationPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |key| std::env::var(key).ok())
    }

    fn from_toml_str_with<F>(content: &str, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let processed_content = Self::substitute_env_vars(content, var)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PG_PASSWORD})；未設定的變數視為缺少配置
    fn substitute_env_vars<F>(content: &str, var: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let mut result = String::with_capacity(content.len());
        let mut last = 0;
        for caps in re.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = var(name.as_str()).ok_or_else(|| EtlError::MissingConfigError {
                field: name.as_str().to_string(),
            })?;
            result.push_str(&content[last..whole.start()]);
            result.push_str(&value);
            last = whole.end();
        }
        result.push_str(&content[last..]);

        Ok(result)
    }

    pub fn job(&self) -> JobConfig {
        JobConfig {
            query: self.source.query.clone(),
            table_id: self.load.table_id.clone(),
            target: TargetSchema::new(self.transform.required_columns.iter().cloned()),
            timezone: self
                .transform
                .timezone
                .clone()
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            on_validation_failure: self
                .validation
                .as_ref()
                .and_then(|v| v.on_failure)
                .unwrap_or_default(),
        }
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// Combines this file with environment variables. Values in the file win.
    pub fn resolve<F>(&self, var: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_var = |key: &str| {
            let from_file = match key {
                "PG_HOST" => self.source.host.clone(),
                "PG_PORT" => self.source.port.map(|p| p.to_string()),
                "PG_DATABASE" => self.source.database.clone(),
                "PG_USER" => self.source.user.clone(),
                "PG_PASSWORD" => self.source.password.clone(),
                _ => None,
            };
            from_file.or_else(|| var(key))
        };
        let source = SourceSettings::from_vars(source_var)?;

        let warehouse_var = |key: &str| {
            let from_file = match key {
                "CREDENTIALS_PATH" => self.load.credentials_path.clone(),
                "BIGQUERY_API_BASE" => self.load.api_base.clone(),
                "BIGQUERY_UPLOAD_BASE" => self.load.upload_base.clone(),
                _ => None,
            };
            from_file.or_else(|| var(key))
        };
        let mut warehouse = WarehouseSettings::from_vars(warehouse_var)?;
        if let Some(millis) = self.load.poll_interval_ms {
            warehouse.poll_interval = Duration::from_millis(millis);
        }

        Ok(AppConfig {
            pipeline_name: self.pipeline.name.clone(),
            source,
            warehouse,
            job: self.job(),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        if let Some(api_base) = &self.load.api_base {
            crate::utils::validation::validate_url("load.api_base", api_base)?;
        }
        if let Some(upload_base) = &self.load.upload_base {
            crate::utils::validation::validate_url("load.upload_base", upload_base)?;
        }
        self.job().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "customers-to-bq"

[source]
query = "SELECT id, name, email FROM customers"
host = "localhost"

[transform]
required_columns = ["id", "name", "email"]

[load]
table_id = "my-project.crm.customers"
credentials_path = "/keys/sa.json"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.pipeline.name, "customers-to-bq");
        assert!(config.validate().is_ok());

        let job = config.job();
        assert_eq!(job.target.columns(), &["id", "name", "email"]);
        assert_eq!(job.timezone, "UTC");
        assert_eq!(job.on_validation_failure, ValidationPolicy::Proceed);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_validation_policy_and_logging() {
        let content = format!(
            "{}\n[validation]\non_failure = \"abort\"\n\n[logging]\njson = true\n",
            BASIC
        );
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.job().on_validation_failure, ValidationPolicy::Abort);
        assert!(config.json_logs());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("WAREHOUSE_ETL_TEST_TABLE", "proj.ds.from_env");

        let content = BASIC.replace("my-project.crm.customers", "${WAREHOUSE_ETL_TEST_TABLE}");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.load.table_id, "proj.ds.from_env");

        std::env::remove_var("WAREHOUSE_ETL_TEST_TABLE");
    }

    #[test]
    fn test_resolve_prefers_file_over_environment() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();
        let env = |key: &str| match key {
            "PG_HOST" => Some("env-host".to_string()),
            "PG_DATABASE" => Some("crm".to_string()),
            "PG_USER" => Some("etl".to_string()),
            "PG_PASSWORD" => Some("pw".to_string()),
            "CREDENTIALS_PATH" => Some("/env/sa.json".to_string()),
            _ => None,
        };

        let app = config.resolve(env).unwrap();
        assert_eq!(app.source.host, "localhost");
        assert_eq!(app.source.database, "crm");
        assert_eq!(
            app.warehouse.credentials_path,
            std::path::PathBuf::from("/keys/sa.json")
        );
        assert_eq!(app.job.table_id, "my-project.crm.customers");
    }

    #[test]
    fn test_config_validation_rejects_bad_table_id() {
        let content = BASIC.replace("my-project.crm.customers", "onlytwo.parts");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "customers-to-bq");
    }

    #[test]
    fn test_unset_placeholder_is_missing_config() {
        let content = BASIC.replace(
            "host = \"localhost\"",
            "host = \"localhost\"\npassword = \"${WAREHOUSE_ETL_TEST_UNSET_SECRET}\"",
        );

        let err = TomlConfig::from_toml_str_with(&content, |_| None).unwrap_err();
        assert!(matches!(
            err,
            EtlError::MissingConfigError { field } if field == "WAREHOUSE_ETL_TEST_UNSET_SECRET"
        ));
    }

    #[test]
    fn test_placeholder_resolves_to_secret() {
        let content = BASIC.replace(
            "host = \"localhost\"",
            "host = \"localhost\"\npassword = \"${PG_PASSWORD}\"",
        );
        let env = |key: &str| (key == "PG_PASSWORD").then(|| "s3cret".to_string());

        let config = TomlConfig::from_toml_str_with(&content, env).unwrap();
        assert_eq!(config.source.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = TomlConfig::from_toml_str_with(
            include_str!("../../etl-config.example.toml"),
            |key| (key == "PG_PASSWORD").then(|| "pw".to_string()),
        )
        .unwrap();
        assert_eq!(config.pipeline.name, "customers-to-bigquery");
        assert_eq!(config.load.credentials_path, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_section_is_a_config_error() {
        let err = TomlConfig::from_toml_str("[pipeline]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }
}
