use crate::config::SourceSettings;
use crate::core::{Cell, SourceDatabase, SourceRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use std::collections::HashSet;

/// PostgreSQL source. Every query opens its own connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    settings: SourceSettings,
}

impl PostgresSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self { settings }
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.settings.host)
            .port(self.settings.port)
            .database(&self.settings.database)
            .username(&self.settings.user)
            .password(&self.settings.password)
    }
}

#[async_trait]
impl SourceDatabase for PostgresSource {
    async fn query(&self, sql: &str) -> Result<Vec<SourceRecord>> {
        tracing::debug!(
            "Connecting to postgres at {}:{}/{}",
            self.settings.host,
            self.settings.port,
            self.settings.database
        );
        let mut conn = PgConnection::connect_with(&self.connect_options()).await?;

        let fetched = sqlx::query(sql).fetch_all(&mut conn).await;
        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close postgres connection cleanly: {}", e);
        }
        let rows = fetched?;
        if let Some(first) = rows.first() {
            warn_duplicate_columns(first.columns().iter().map(|c| c.name()));
        }

        Ok(rows.iter().map(decode_row).collect())
    }
}

fn decode_row(row: &PgRow) -> SourceRecord {
    row.columns()
        .iter()
        .map(|column| {
            let cell = decode_cell(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), cell)
        })
        .collect()
}

/// Rows are keyed by column name, so a repeated name keeps only its last value.
fn warn_duplicate_columns<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    for name in names {
        if !seen.insert(name) {
            duplicates += 1;
            tracing::warn!(
                "Result set has more than one column named '{}'; only the last value is kept",
                name
            );
        }
    }
    duplicates
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Cell {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Cell::Null,
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("Cannot read column {}: {}", index, e);
            return unsupported(row, index, type_name);
        }
    }

    let decoded = match type_name {
        "INT2" => row.try_get::<i16, _>(index).map(|v| Cell::Int(v.into())),
        "INT4" => row.try_get::<i32, _>(index).map(|v| Cell::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(index).map(Cell::Int),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Cell::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Cell::Float),
        "NUMERIC" => row.try_get::<Decimal, _>(index).map(|d| {
            let text = d.to_string();
            match text.parse::<f64>() {
                Ok(f) => Cell::Float(f),
                Err(_) => Cell::Text(text),
            }
        }),
        "BOOL" => row.try_get::<bool, _>(index).map(Cell::Bool),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<String, _>(index).map(Cell::Text),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|u| Cell::Text(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(index).map(Cell::Json),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).map(Cell::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(Cell::TimestampTz),
        "DATE" => row.try_get::<NaiveDate, _>(index).map(Cell::Date),
        "TIME" => row.try_get::<NaiveTime, _>(index).map(Cell::Time),
        _ => return unsupported(row, index, type_name),
    };

    decoded.unwrap_or_else(|e| {
        tracing::warn!("Failed to decode {} column {}: {}", type_name, index, e);
        unsupported(row, index, type_name)
    })
}

fn unsupported(row: &PgRow, index: usize, type_name: &str) -> Cell {
    Cell::Unsupported {
        type_name: type_name.to_string(),
        text: row.try_get_unchecked::<String, _>(index).ok(),
    }
}
