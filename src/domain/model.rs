use crate::utils::error::{EtlError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One record, keyed by column name. Key order is the order the columns were produced in.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub type RowSet = Vec<Row>;

/// A single decoded source value, before it is encoded as interchange JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(chrono::NaiveDateTime),
    TimestampTz(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(serde_json::Value),
    /// A column type with no dedicated mapping; `text` holds its textual form when the driver could produce one.
    Unsupported {
        type_name: String,
        text: Option<String>,
    },
}

/// A source row as returned by the database, columns in result-set order.
pub type SourceRecord = Vec<(String, Cell)>;

/// Ordered list of the destination table's required columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSchema(Vec<String>);

impl TargetSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    /// Parses a comma-separated column list, dropping blanks.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty()),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// BigQuery column type derived from observed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InferredType {
    Int64,
    Float64,
    Bool,
    Timestamp,
    Json,
    String,
}

impl InferredType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferredType::Int64 => "INT64",
            InferredType::Float64 => "FLOAT64",
            InferredType::Bool => "BOOL",
            InferredType::Timestamp => "TIMESTAMP",
            InferredType::Json => "JSON",
            InferredType::String => "STRING",
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows reshaped to the target columns plus the inferred column types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedPayload {
    pub rows: RowSet,
    pub schema: IndexMap<String, InferredType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingInSchema { column: String },
    MissingInRow { row: usize, column: String },
    NullValue { row: usize, column: String },
    AllNull { column: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingInSchema { column } => {
                write!(f, "Missing column in schema: {}", column)
            }
            ValidationIssue::MissingInRow { row, column } => {
                write!(f, "Row {}: missing column {}", row, column)
            }
            ValidationIssue::NullValue { row, column } => {
                write!(f, "Row {}: column {} is null", row, column)
            }
            ValidationIssue::AllNull { column } => {
                write!(f, "All values are null for required column: {}", column)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReport {
    Passed,
    Failed(Vec<ValidationIssue>),
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            ValidationReport::Passed
        } else {
            ValidationReport::Failed(issues)
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationReport::Passed)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ValidationReport::Passed => &[],
            ValidationReport::Failed(issues) => issues,
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReport::Passed => f.write_str("✔ Validation Passed"),
            ValidationReport::Failed(issues) => {
                f.write_str("Validation Failed:")?;
                for issue in issues {
                    write!(f, "\n{}", issue)?;
                }
                Ok(())
            }
        }
    }
}

/// Fully qualified `project.dataset.table` destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    dataset: dataset.to_string(),
                    table: table.to_string(),
                })
            }
            _ => Err(EtlError::InvalidTableId {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_loaded: usize,
    pub table_id: TableId,
    pub job_id: String,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loaded {} rows into {} using load job.",
            self.rows_loaded, self.table_id
        )
    }
}
