use crate::config::{JobConfig, ValidationPolicy};
use crate::core::{extract, load, transform, validate};
use crate::core::{LoadSummary, SourceDatabase, TransformedPayload, ValidationReport, Warehouse};
use crate::utils::error::{EtlError, Result};
use std::time::Instant;

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub extracted_rows: usize,
    pub payload: TransformedPayload,
    pub validation: ValidationReport,
    pub load: LoadSummary,
}

/// Runs extract, transform, validate and load in sequence for one batch.
pub struct EtlEngine<D: SourceDatabase, W: Warehouse> {
    source: D,
    warehouse: W,
    job: JobConfig,
}

impl<D: SourceDatabase, W: Warehouse> EtlEngine<D, W> {
    pub fn new(source: D, warehouse: W, job: JobConfig) -> Self {
        Self {
            source,
            warehouse,
            job,
        }
    }

    pub async fn run(&self) -> Result<PipelineReport> {
        let started = Instant::now();
        tracing::info!("🚀 Starting ETL run into {}", self.job.table_id);

        tracing::info!("Extracting data...");
        let rows = extract::extract_rows(&self.source, &self.job.query).await?;
        let extracted_rows = rows.len();

        tracing::info!("Transforming {} rows...", extracted_rows);
        let payload = transform::transform_rows(&rows, &self.job.target, &self.job.timezone);
        tracing::debug!("Inferred schema: {:?}", payload.schema);

        tracing::info!("Validating payload...");
        let validation = validate::validate(&payload, &self.job.target);
        if !validation.is_passed() {
            match self.job.on_validation_failure {
                ValidationPolicy::Proceed => {
                    tracing::warn!("{}", validation);
                    tracing::warn!("Proceeding with load despite validation issues");
                }
                ValidationPolicy::Abort => {
                    tracing::error!("{}", validation);
                    return Err(EtlError::ValidationFailed { report: validation });
                }
            }
        }

        tracing::info!("Loading data...");
        let load = load::load_rows(&self.warehouse, &payload.rows, &self.job.table_id).await?;

        tracing::info!("✅ ETL run finished in {:?}", started.elapsed());
        Ok(PipelineReport {
            extracted_rows,
            payload,
            validation,
            load,
        })
    }
}
