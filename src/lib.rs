pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use adapters::{bigquery::BigQueryWarehouse, postgres::PostgresSource};
pub use config::{AppConfig, JobConfig, SourceSettings, ValidationPolicy, WarehouseSettings};
pub use core::etl::{EtlEngine, PipelineReport};
pub use utils::error::{EtlError, Result};
