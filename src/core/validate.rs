use crate::core::{Row, TargetSchema, TransformedPayload, ValidationIssue, ValidationReport};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

/// Checks a typed payload against the target columns.
pub fn validate(payload: &TransformedPayload, target: &TargetSchema) -> ValidationReport {
    collect_issues(&payload.rows, |column| payload.schema.contains_key(column), target)
}

/// Parses payload JSON and checks it. Only a parse failure is an error; contract
/// violations are returned in the report.
pub fn validate_json(payload_json: &str, target: &TargetSchema) -> Result<ValidationReport> {
    let invalid = |reason: String| {
        EtlError::invalid_input(format!("Invalid transformed payload JSON: {}", reason))
    };

    let payload: Value = serde_json::from_str(payload_json).map_err(|e| invalid(e.to_string()))?;
    let Value::Object(mut payload) = payload else {
        return Err(invalid("expected an object with 'rows' and 'schema'".to_string()));
    };

    let rows: Vec<Row> = match payload.remove("rows") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(invalid(format!("row is not an object: {}", other))),
            })
            .collect::<Result<_>>()?,
        Some(other) => return Err(invalid(format!("'rows' is not an array: {}", other))),
    };
    let schema = match payload.remove("schema") {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(invalid(format!("'schema' is not an object: {}", other))),
    };

    Ok(collect_issues(&rows, |column| schema.contains_key(column), target))
}

fn collect_issues<F>(rows: &[Row], in_schema: F, target: &TargetSchema) -> ValidationReport
where
    F: Fn(&str) -> bool,
{
    let mut issues = Vec::new();

    for column in target.iter() {
        if !in_schema(column) {
            issues.push(ValidationIssue::MissingInSchema {
                column: column.to_string(),
            });
        }
    }

    for (row_index, row) in rows.iter().enumerate() {
        for column in target.iter() {
            match row.get(column) {
                None => issues.push(ValidationIssue::MissingInRow {
                    row: row_index,
                    column: column.to_string(),
                }),
                Some(Value::Null) => issues.push(ValidationIssue::NullValue {
                    row: row_index,
                    column: column.to_string(),
                }),
                Some(_) => {}
            }
        }
    }

    for column in target.iter() {
        let has_value = rows
            .iter()
            .any(|row| row.get(column).is_some_and(|v| !v.is_null()));
        if !has_value {
            issues.push(ValidationIssue::AllNull {
                column: column.to_string(),
            });
        }
    }

    if issues.is_empty() {
        tracing::info!("✔ Validation passed for {} rows", rows.len());
    } else {
        tracing::warn!("Validation found {} issue(s)", issues.len());
    }
    ValidationReport::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InferredType;

    fn target() -> TargetSchema {
        TargetSchema::new(["id", "name", "email"])
    }

    #[test]
    fn test_complete_payload_passes() {
        let text = r#"{"rows": [{"id": 1, "name": "A", "email": "a@x.io"}],
                       "schema": {"id": "INT64", "name": "STRING", "email": "STRING"}}"#;
        let report = validate_json(text, &target()).unwrap();
        assert!(report.is_passed());
        assert_eq!(report.to_string(), "✔ Validation Passed");
    }

    #[test]
    fn test_missing_schema_column_reported_once() {
        let text = r#"{"rows": [{"id": 1, "name": "A", "email": "a@x.io"},
                                {"id": 2, "name": "B", "email": "b@x.io"}],
                       "schema": {"id": "INT64", "name": "STRING"}}"#;
        let report = validate_json(text, &target()).unwrap();

        assert_eq!(
            report.issues(),
            &[ValidationIssue::MissingInSchema {
                column: "email".to_string()
            }]
        );
    }

    #[test]
    fn test_row_level_issues_in_order() {
        let text = r#"{"rows": [{"id": 1, "name": null}, {"id": 2, "name": "B", "email": null}],
                       "schema": {"id": "INT64", "name": "STRING", "email": "STRING"}}"#;
        let report = validate_json(text, &target()).unwrap();

        let messages: Vec<String> = report.issues().iter().map(|i| i.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Row 0: column name is null",
                "Row 0: missing column email",
                "Row 1: column email is null",
                "All values are null for required column: email",
            ]
        );
    }

    #[test]
    fn test_empty_rows_flag_every_column_as_all_null() {
        let payload = TransformedPayload {
            rows: vec![],
            schema: [
                ("id".to_string(), InferredType::Int64),
                ("name".to_string(), InferredType::String),
                ("email".to_string(), InferredType::String),
            ]
            .into_iter()
            .collect(),
        };
        let report = validate(&payload, &target());
        assert_eq!(report.issues().len(), 3);
        assert!(report
            .issues()
            .iter()
            .all(|i| matches!(i, ValidationIssue::AllNull { .. })));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let report = validate_json("{}", &TargetSchema::new(["id"])).unwrap();
        assert_eq!(
            report.to_string(),
            "Validation Failed:\nMissing column in schema: id\nAll values are null for required column: id"
        );
    }

    #[test]
    fn test_unparseable_payload_is_an_error() {
        let err = validate_json("not json", &target()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid transformed payload JSON"));

        let err = validate_json("[1, 2]", &target()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid transformed payload JSON"));
    }

    #[test]
    fn test_validate_does_not_mutate_payload() {
        let payload = TransformedPayload {
            rows: vec![serde_json::from_str(r#"{"id": null}"#).unwrap()],
            schema: [("id".to_string(), InferredType::String)].into_iter().collect(),
        };
        let before = payload.clone();
        let _ = validate(&payload, &TargetSchema::new(["id"]));
        assert_eq!(payload, before);
    }
}
