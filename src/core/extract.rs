use crate::core::{Cell, Row, RowSet, SourceDatabase, SourceRecord};
use crate::utils::error::{EtlError, Result};
use serde_json::{Number, Value};

const ISO_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Runs `query` and returns the result set as interchange JSON text.
pub async fn extract<D: SourceDatabase + ?Sized>(source: &D, query: &str) -> Result<String> {
    let records = fetch(source, query).await?;
    let rows = encode_records(&records)?;
    Ok(serde_json::to_string(&rows)?)
}

/// Runs `query` and returns the encoded rows without going through text.
pub async fn extract_rows<D: SourceDatabase + ?Sized>(source: &D, query: &str) -> Result<RowSet> {
    let records = fetch(source, query).await?;
    encode_records(&records)
}

async fn fetch<D: SourceDatabase + ?Sized>(source: &D, query: &str) -> Result<Vec<SourceRecord>> {
    tracing::debug!("Running source query: {}", query);
    let records = source.query(query).await?;
    tracing::info!("📥 Fetched {} rows from source", records.len());
    Ok(records)
}

/// Encodes source records with the strict codec, falling back to the permissive one.
pub fn encode_records(records: &[SourceRecord]) -> Result<RowSet> {
    let strict: std::result::Result<RowSet, String> = records
        .iter()
        .map(|r| encode_record(r, Codec::Strict))
        .collect();
    match strict {
        Ok(rows) => Ok(rows),
        Err(reason) => {
            tracing::warn!(
                "Strict encoding failed ({}), falling back to permissive encoding",
                reason
            );
            records
                .iter()
                .map(|r| encode_record(r, Codec::Permissive))
                .collect::<std::result::Result<RowSet, String>>()
                .map_err(|e| {
                    EtlError::invalid_input(format!("Failed to serialize result to JSON: {}", e))
                })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Strict,
    Permissive,
}

fn encode_record(record: &SourceRecord, codec: Codec) -> std::result::Result<Row, String> {
    let mut row = Row::new();
    for (column, cell) in record {
        row.insert(column.clone(), encode_cell(column, cell, codec)?);
    }
    Ok(row)
}

fn encode_cell(column: &str, cell: &Cell, codec: Codec) -> std::result::Result<Value, String> {
    let value = match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::Number((*i).into()),
        Cell::Float(f) => match Number::from_f64(*f) {
            Some(n) => Value::Number(n),
            None if codec == Codec::Permissive => Value::Null,
            None => return Err(format!("column {} holds non-finite float {}", column, f)),
        },
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Timestamp(ts) => Value::String(ts.format(ISO_TIMESTAMP).to_string()),
        Cell::TimestampTz(ts) => Value::String(format!("{}Z", ts.format(ISO_TIMESTAMP))),
        Cell::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        Cell::Time(t) => Value::String(t.format("%H:%M:%S").to_string()),
        Cell::Json(v) => v.clone(),
        Cell::Unsupported { type_name, text } => match codec {
            Codec::Permissive => text.clone().map(Value::String).unwrap_or(Value::Null),
            Codec::Strict => {
                return Err(format!(
                    "column {} has unsupported type {}",
                    column, type_name
                ))
            }
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    struct FixedSource {
        records: Vec<SourceRecord>,
    }

    #[async_trait]
    impl SourceDatabase for FixedSource {
        async fn query(&self, _sql: &str) -> Result<Vec<SourceRecord>> {
            Ok(self.records.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SourceDatabase for FailingSource {
        async fn query(&self, _sql: &str) -> Result<Vec<SourceRecord>> {
            Err(EtlError::DatabaseError(sqlx::Error::PoolTimedOut))
        }
    }

    fn record(cells: Vec<(&str, Cell)>) -> SourceRecord {
        cells
            .into_iter()
            .map(|(name, cell)| (name.to_string(), cell))
            .collect()
    }

    #[tokio::test]
    async fn test_extract_serializes_rows_in_column_order() {
        let source = FixedSource {
            records: vec![
                record(vec![
                    ("id", Cell::Int(1)),
                    ("name", Cell::Text("Alice".to_string())),
                    ("active", Cell::Bool(true)),
                ]),
                record(vec![
                    ("id", Cell::Int(2)),
                    ("name", Cell::Null),
                    ("active", Cell::Bool(false)),
                ]),
            ],
        };

        let text = extract(&source, "SELECT * FROM customers").await.unwrap();
        assert_eq!(
            text,
            r#"[{"id":1,"name":"Alice","active":true},{"id":2,"name":null,"active":false}]"#
        );
    }

    #[tokio::test]
    async fn test_extract_formats_temporal_values_as_iso() {
        let created = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_milli_opt(10, 20, 30, 250)
            .unwrap();
        let source = FixedSource {
            records: vec![record(vec![
                ("created", Cell::Timestamp(created)),
                (
                    "updated",
                    Cell::TimestampTz(Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap()),
                ),
                (
                    "birthday",
                    Cell::Date(NaiveDate::from_ymd_opt(1990, 1, 31).unwrap()),
                ),
            ])],
        };

        let rows = extract_rows(&source, "SELECT 1").await.unwrap();
        assert_eq!(rows[0]["created"], json!("2024-03-05T10:20:30.250"));
        assert_eq!(rows[0]["updated"], json!("2024-03-05T08:00:00.000Z"));
        assert_eq!(rows[0]["birthday"], json!("1990-01-31"));
    }

    #[test]
    fn test_non_finite_float_falls_back_to_null() {
        let records = vec![record(vec![
            ("score", Cell::Float(f64::NAN)),
            ("ratio", Cell::Float(0.5)),
            (
                "range",
                Cell::Unsupported {
                    type_name: "INT4RANGE".to_string(),
                    text: Some("[1,5)".to_string()),
                },
            ),
            (
                "blob",
                Cell::Unsupported {
                    type_name: "BYTEA".to_string(),
                    text: None,
                },
            ),
        ])];

        let rows = encode_records(&records).unwrap();
        assert_eq!(rows[0]["score"], Value::Null);
        assert_eq!(rows[0]["ratio"], json!(0.5));
        assert_eq!(rows[0]["range"], json!("[1,5)"));
        assert_eq!(rows[0]["blob"], Value::Null);
    }

    #[test]
    fn test_nested_json_is_kept_as_structure() {
        let records = vec![record(vec![("meta", Cell::Json(json!({"tags": ["a", "b"]})))])];
        let rows = encode_records(&records).unwrap();
        assert_eq!(rows[0]["meta"], json!({"tags": ["a", "b"]}));
    }

    #[tokio::test]
    async fn test_extract_propagates_source_errors() {
        let err = extract(&FailingSource, "SELECT 1").await.unwrap_err();
        assert_eq!(
            err.category(),
            crate::utils::error::ErrorCategory::ExternalSystem
        );
    }
}
