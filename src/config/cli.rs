use crate::core::transform::DEFAULT_TIMEZONE;
use crate::core::TargetSchema;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::io::Read;

#[derive(Debug, Clone, Parser)]
#[command(name = "warehouse-etl")]
#[command(about = "Batch ETL from PostgreSQL into BigQuery")]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run extract, transform, validate and load for one batch
    Run {
        /// Path to TOML job configuration
        #[arg(short, long, default_value = "etl-config.toml")]
        config: String,

        /// Stop before loading when validation reports issues
        #[arg(long)]
        abort_on_invalid: bool,

        /// Show the resolved job without touching any database
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a query and print the rows as JSON
    Extract {
        #[arg(short, long)]
        query: String,
    },

    /// Reshape row JSON to the target columns and print the payload
    Transform {
        /// Row JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Target columns, comma separated
        #[arg(short, long, value_parser = parse_columns)]
        columns: TargetSchema,

        #[arg(long, default_value = DEFAULT_TIMEZONE)]
        timezone: String,
    },

    /// Check a transformed payload against the target columns
    Validate {
        /// Payload JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Target columns, comma separated
        #[arg(short, long, value_parser = parse_columns)]
        columns: TargetSchema,
    },

    /// Append rows (or a transformed payload) to a BigQuery table
    Load {
        /// Rows or payload JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Destination in the form project.dataset.table
        #[arg(short, long)]
        table_id: String,
    },
}

fn parse_columns(list: &str) -> std::result::Result<TargetSchema, String> {
    let target = TargetSchema::parse(list);
    if target.is_empty() {
        return Err("at least one column is required".to_string());
    }
    Ok(target)
}

/// Reads stage input from a file, or from stdin when `source` is `-`.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}
