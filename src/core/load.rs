use crate::core::transform::rows_from_value;
use crate::core::{LoadSummary, Row, RowSet, TableId, Warehouse};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

/// Appends rows given as interchange text. Accepts either a bare array of rows or a
/// transformed payload object, in which case its `rows` are loaded.
pub async fn load<W: Warehouse + ?Sized>(
    warehouse: &W,
    rows_json: &str,
    table_id: &str,
) -> Result<LoadSummary> {
    let rows = parse_load_input(rows_json)?;
    load_rows(warehouse, &rows, table_id).await
}

/// Appends typed rows to `table_id` (`project.dataset.table`).
pub async fn load_rows<W: Warehouse + ?Sized>(
    warehouse: &W,
    rows: &[Row],
    table_id: &str,
) -> Result<LoadSummary> {
    let table = TableId::parse(table_id)?;
    let ndjson = to_ndjson(rows);

    tracing::info!(
        "💾 Loading {} rows ({} bytes) into {}",
        rows.len(),
        ndjson.len(),
        table
    );
    let job_id = warehouse.append_ndjson(&table, ndjson.into_bytes()).await?;

    let summary = LoadSummary {
        rows_loaded: rows.len(),
        table_id: table,
        job_id,
    };
    tracing::info!("📦 {}", summary);
    Ok(summary)
}

fn parse_load_input(rows_json: &str) -> Result<RowSet> {
    let value: Value = serde_json::from_str(rows_json)
        .map_err(|e| EtlError::invalid_input(format!("Invalid JSON provided: {}", e)))?;
    let value = match value {
        Value::Object(mut payload) if payload.contains_key("rows") => {
            payload.remove("rows").unwrap_or(Value::Null)
        }
        other => other,
    };
    rows_from_value(value)
        .map_err(|e| EtlError::invalid_input(format!("Invalid JSON provided: {}", e)))
}

/// One compact JSON object per line, no trailing newline.
pub fn to_ndjson(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| Value::Object(row.clone()).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingWarehouse {
        calls: Arc<Mutex<Vec<(TableId, String)>>>,
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn append_ndjson(&self, table: &TableId, ndjson: Vec<u8>) -> Result<String> {
            let body = String::from_utf8(ndjson).unwrap();
            self.calls.lock().await.push((table.clone(), body));
            Ok("job_123".to_string())
        }
    }

    #[tokio::test]
    async fn test_load_converts_rows_to_ndjson() {
        let warehouse = RecordingWarehouse::default();
        let summary = load(
            &warehouse,
            r#"[{"id": 1, "name": "A"}, {"id": 2, "name": null}]"#,
            "proj.crm.customers",
        )
        .await
        .unwrap();

        assert_eq!(summary.rows_loaded, 2);
        assert_eq!(summary.job_id, "job_123");
        assert_eq!(
            summary.to_string(),
            "Loaded 2 rows into proj.crm.customers using load job."
        );

        let calls = warehouse.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.dataset, "crm");
        assert_eq!(calls[0].1, "{\"id\":1,\"name\":\"A\"}\n{\"id\":2,\"name\":null}");
    }

    #[tokio::test]
    async fn test_load_accepts_full_payload() {
        let warehouse = RecordingWarehouse::default();
        let summary = load(
            &warehouse,
            r#"{"rows": [{"id": 1}], "schema": {"id": "INT64"}}"#,
            "p.d.t",
        )
        .await
        .unwrap();
        assert_eq!(summary.rows_loaded, 1);
    }

    #[tokio::test]
    async fn test_malformed_table_id_never_reaches_warehouse() {
        let warehouse = RecordingWarehouse::default();
        let err = load(&warehouse, r#"[{"id": 1}]"#, "onlytwo.parts")
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::InvalidTableId { .. }));
        assert!(warehouse.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let warehouse = RecordingWarehouse::default();
        let err = load(&warehouse, "[{oops", "p.d.t").await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON provided"));
        assert!(warehouse.calls.lock().await.is_empty());
    }

    #[test]
    fn test_empty_rows_produce_empty_ndjson() {
        assert_eq!(to_ndjson(&[]), "");
    }
}
