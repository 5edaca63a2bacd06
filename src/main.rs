use clap::Parser;
use warehouse_etl::config::cli::{read_input, Command};
use warehouse_etl::config::toml_config::TomlConfig;
use warehouse_etl::core::{extract, load, transform, validate};
use warehouse_etl::utils::error::ErrorSeverity;
use warehouse_etl::utils::{logger, validation::Validate};
use warehouse_etl::{
    AppConfig, BigQueryWarehouse, Cli, EtlEngine, EtlError, PostgresSource, SourceSettings,
    ValidationPolicy, WarehouseSettings,
};

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let json_logs = cli.log_json
        || match &cli.command {
            Command::Run { config, .. } => TomlConfig::from_file(config)
                .map(|c| c.json_logs())
                .unwrap_or(false),
            _ => false,
        };
    logger::init_cli_logger(cli.verbose, json_logs);
    tracing::debug!("CLI arguments: {:?}", cli);

    match execute(cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn execute(command: Command) -> Result<String, EtlError> {
    match command {
        Command::Run {
            config,
            abort_on_invalid,
            dry_run,
        } => run_pipeline(&config, abort_on_invalid, dry_run).await,
        Command::Extract { query } => {
            let settings = SourceSettings::from_env()?;
            settings.validate()?;
            extract::extract(&PostgresSource::new(settings), &query).await
        }
        Command::Transform {
            input,
            columns,
            timezone,
        } => {
            let raw = read_input(&input)?;
            transform::transform(&raw, &columns, &timezone)
        }
        Command::Validate { input, columns } => {
            let payload = read_input(&input)?;
            let report = validate::validate_json(&payload, &columns)?;
            Ok(report.to_string())
        }
        Command::Load { input, table_id } => {
            let rows = read_input(&input)?;
            let settings = WarehouseSettings::from_env()?;
            settings.validate()?;
            let summary = load::load(&BigQueryWarehouse::new(settings), &rows, &table_id).await?;
            Ok(summary.to_string())
        }
    }
}

async fn run_pipeline(path: &str, abort_on_invalid: bool, dry_run: bool) -> Result<String, EtlError> {
    tracing::info!("📁 Loading configuration from: {}", path);
    let file = TomlConfig::from_file(path)?;
    file.validate()?;

    let mut config = file.resolve(|key| std::env::var(key).ok())?;
    if abort_on_invalid {
        config.job.on_validation_failure = ValidationPolicy::Abort;
    }
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    if dry_run {
        return Ok(describe(&config));
    }

    let engine = EtlEngine::new(
        PostgresSource::new(config.source.clone()),
        BigQueryWarehouse::new(config.warehouse.clone()),
        config.job.clone(),
    );
    let report = engine.run().await?;

    Ok(format!(
        "{}\n{}\nExtracted {} rows; schema: {}",
        report.validation,
        report.load,
        report.extracted_rows,
        report
            .payload
            .schema
            .iter()
            .map(|(column, kind)| format!("{}={}", column, kind))
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

fn describe(config: &AppConfig) -> String {
    let job = &config.job;
    [
        format!("📋 Pipeline: {}", config.pipeline_name),
        format!(
            "  Source: {}:{}/{} as {}",
            config.source.host, config.source.port, config.source.database, config.source.user
        ),
        format!("  Query: {}", job.query),
        format!("  Target columns: {}", job.target.columns().join(", ")),
        format!("  Timezone: {}", job.timezone),
        format!("  Destination: {}", job.table_id),
        format!(
            "  Credentials: {}",
            config.warehouse.credentials_path.display()
        ),
        format!("  On validation failure: {:?}", job.on_validation_failure),
        "🔍 DRY RUN: nothing was read or loaded".to_string(),
    ]
    .join("\n")
}
