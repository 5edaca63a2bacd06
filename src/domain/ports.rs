use crate::domain::model::{SourceRecord, TableId};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Relational source the extractor reads from.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Runs one read query and returns every row of the result set.
    async fn query(&self, sql: &str) -> Result<Vec<SourceRecord>>;
}

/// Destination warehouse accepting bulk appends.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Appends newline-delimited JSON records to `table` and returns the load job id
    /// once the warehouse reports the job as finished.
    async fn append_ndjson(&self, table: &TableId, ndjson: Vec<u8>) -> Result<String>;
}
