use crate::core::{InferredType, Row, RowSet, TargetSchema, TransformedPayload};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde_json::{Number, Value};

/// The only timestamp layout recognized in text columns; normalized values use it too.
pub const TIMESTAMP_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Number of leading non-null values inspected when deciding between JSON and STRING.
pub const JSON_SAMPLE_SIZE: usize = 10;

pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Object,
}

#[derive(Debug)]
struct Column {
    kind: ColumnKind,
    // one entry per input row, null where the row lacks the key
    values: Vec<Value>,
}

/// Reshapes raw row JSON to `target` and returns the payload JSON.
pub fn transform(raw_json: &str, target: &TargetSchema, timezone: &str) -> Result<String> {
    let rows = parse_rows(raw_json)?;
    let payload = transform_rows(&rows, target, timezone);
    serde_json::to_string(&payload).map_err(|e| {
        EtlError::invalid_input(format!("Failed to serialize transformed payload: {}", e))
    })
}

/// Parses interchange text holding an array of row objects.
pub fn parse_rows(raw_json: &str) -> Result<RowSet> {
    let value: Value = serde_json::from_str(raw_json)
        .map_err(|e| EtlError::invalid_input(format!("Invalid JSON input: {}", e)))?;
    rows_from_value(value)
}

pub(crate) fn rows_from_value(value: Value) -> Result<RowSet> {
    let Value::Array(items) = value else {
        return Err(EtlError::invalid_input(
            "Failed to load JSON into table: expected an array of row objects",
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(EtlError::invalid_input(format!(
                "Failed to load JSON into table: element {} is not an object ({})",
                index, other
            ))),
        })
        .collect()
}

/// Restricts `rows` to the target columns and infers a warehouse type per column.
///
/// The timezone is accepted for interface compatibility; timestamps are normalized as
/// naive values and no zone conversion takes place.
pub fn transform_rows(rows: &[Row], target: &TargetSchema, timezone: &str) -> TransformedPayload {
    tracing::debug!(
        "Transforming {} rows to {} target columns (timezone {})",
        rows.len(),
        target.len(),
        timezone
    );

    let mut table = build_table(rows);
    for (name, column) in table.iter_mut() {
        if column.kind == ColumnKind::Object && normalize_timestamps(column) {
            tracing::debug!("Normalized timestamp column '{}'", name);
        }
    }

    let mut out_rows = Vec::with_capacity(rows.len());
    for index in 0..rows.len() {
        let mut out = Row::new();
        for name in target.iter() {
            let value = table
                .get(name)
                .map(|column| output_value(&column.values[index]))
                .unwrap_or(Value::Null);
            out.insert(name.to_string(), value);
        }
        out_rows.push(out);
    }

    let mut schema = IndexMap::with_capacity(target.len());
    for name in target.iter() {
        let inferred = match table.get(name) {
            Some(column) => infer_type(column),
            None => {
                tracing::debug!("Column '{}' absent from source, defaulting to STRING", name);
                InferredType::String
            }
        };
        schema.insert(name.to_string(), inferred);
    }

    TransformedPayload {
        rows: out_rows,
        schema,
    }
}

fn build_table(rows: &[Row]) -> IndexMap<String, Column> {
    let mut names: Vec<&String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !names.contains(&key) {
                names.push(key);
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let values: Vec<Value> = rows
                .iter()
                .map(|row| row.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            let kind = classify(&values);
            let values = if kind == ColumnKind::Float {
                values.into_iter().map(promote_to_float).collect()
            } else {
                values
            };
            (name.clone(), Column { kind, values })
        })
        .collect()
}

// Mirrors tabular dtype rules: nulls force integers to float and booleans to object.
fn classify(values: &[Value]) -> ColumnKind {
    let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
    let has_null = non_null.len() < values.len();

    if non_null.is_empty() {
        return ColumnKind::Object;
    }
    if non_null.iter().all(|v| v.is_boolean()) {
        return if has_null {
            ColumnKind::Object
        } else {
            ColumnKind::Bool
        };
    }
    if non_null.iter().all(|v| v.is_number()) {
        let all_integers = non_null.iter().all(|v| v.is_i64() || v.is_u64());
        return if all_integers && !has_null {
            ColumnKind::Int
        } else {
            ColumnKind::Float
        };
    }
    ColumnKind::Object
}

fn promote_to_float(value: Value) -> Value {
    match value.as_f64().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::Null,
    }
}

/// Rewrites the whole column when at least one value matches [`TIMESTAMP_PATTERN`].
/// Values that do not match become null. The column stays text, so its type is still
/// decided by sampling.
fn normalize_timestamps(column: &mut Column) -> bool {
    let parsed: Vec<Option<NaiveDateTime>> = column
        .values
        .iter()
        .map(|v| {
            v.as_str()
                .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_PATTERN).ok())
        })
        .collect();

    if !parsed.iter().any(Option::is_some) {
        return false;
    }

    column.values = parsed
        .into_iter()
        .map(|ts| match ts {
            Some(ts) => Value::String(ts.format(TIMESTAMP_PATTERN).to_string()),
            None => Value::Null,
        })
        .collect();
    true
}

fn output_value(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

fn infer_type(column: &Column) -> InferredType {
    match column.kind {
        ColumnKind::Int => InferredType::Int64,
        ColumnKind::Float => InferredType::Float64,
        ColumnKind::Bool => InferredType::Bool,
        ColumnKind::Object => {
            let sample: Vec<String> = column
                .values
                .iter()
                .filter(|v| !v.is_null())
                .take(JSON_SAMPLE_SIZE)
                .map(value_text)
                .collect();
            if !sample.is_empty() && sample.iter().all(|s| is_nested_json(s)) {
                InferredType::Json
            } else {
                InferredType::String
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_nested_json(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}
