use crate::domain::model::ValidationReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Token signing error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Invalid table_id format, expected project.dataset.table: {value}")]
    InvalidTableId { value: String },

    #[error("Credential error: {message}")]
    CredentialError { message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("BigQuery Load Error: {message}")]
    LoadJobError { message: String },

    #[error("Validation failed with {} issue(s)", .report.issues().len())]
    ValidationFailed { report: ValidationReport },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure family of an error, used by callers to branch without matching text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputMalformed,
    ExternalSystem,
    DataContract,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        EtlError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::InvalidInput { .. }
            | EtlError::InvalidTableId { .. }
            | EtlError::SerializationError(_) => ErrorCategory::InputMalformed,
            EtlError::IoError(_)
            | EtlError::DatabaseError(_)
            | EtlError::ApiError(_)
            | EtlError::TokenError(_)
            | EtlError::CredentialError { .. }
            | EtlError::AuthError { .. }
            | EtlError::LoadJobError { .. } => ErrorCategory::ExternalSystem,
            EtlError::ValidationFailed { .. } => ErrorCategory::DataContract,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::DataContract => ErrorSeverity::Medium,
            ErrorCategory::InputMalformed => ErrorSeverity::High,
            ErrorCategory::ExternalSystem => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::DatabaseError(_) => {
                "Check PG_HOST, PG_PORT, PG_DATABASE, PG_USER, PG_PASSWORD and the query syntax"
            }
            EtlError::CredentialError { .. } | EtlError::TokenError(_) => {
                "Check that CREDENTIALS_PATH points to a valid service account JSON key"
            }
            EtlError::AuthError { .. } => {
                "Check that the service account is enabled and the token endpoint is reachable"
            }
            EtlError::ApiError(_) => "Check network connectivity to the warehouse API",
            EtlError::LoadJobError { .. } => {
                "Check the destination table schema and the service account permissions"
            }
            EtlError::InvalidTableId { .. } => "Use a table id of the form project.dataset.table",
            EtlError::InvalidInput { .. } | EtlError::SerializationError(_) => {
                "Check that the stage input is the JSON produced by the previous stage"
            }
            EtlError::ValidationFailed { .. } => {
                "Fix the source query or target columns, or set on_failure = \"proceed\""
            }
            EtlError::IoError(_) => "Check file paths and permissions",
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Check the configuration file and environment variables"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ValidationFailed { report } => report.to_string(),
            EtlError::MissingConfigError { field } => {
                format!("Required setting '{}' is not configured", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
