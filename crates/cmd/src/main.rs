use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cmd::commands::{
    OutputFormat, PipelineStage, WarehouseAction, pipeline_command, query_command,
    warehouse_command,
};
use cmd::config::Settings;
use diagnostics::LogLevel;
use lakestore::Lake;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "tunelake")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML configuration file
    #[arg(short, long, global = true, env = "TUNELAKE_CONFIG")]
    config: Option<PathBuf>,
    /// Input location (s3://bucket/prefix, s3a://, file:// or a local directory)
    #[arg(long, global = true)]
    input: Option<String>,
    /// Output location for the star schema tables
    #[arg(long, global = true)]
    output: Option<String>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build songs and artists from the song catalog
    Catalog {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build users, time and songplays from the event logs
    Events {
        #[arg(long)]
        json: bool,
    },
    /// Catalog, then events
    Run {
        #[arg(long)]
        json: bool,
    },
    /// Run SQL against the output tables
    Query {
        sql: String,
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Print warehouse DDL/DML for the same schema
    Warehouse {
        #[arg(value_enum)]
        action: WarehouseAction,
    },
}

fn init_logging(verbose: bool, settings: &Settings) {
    if verbose {
        diagnostics::init_with_level(LogLevel::Debug);
    } else if std::env::var_os(diagnostics::LOG_ENV).is_some() {
        diagnostics::init();
    } else {
        diagnostics::init_with_level(settings.log_level().unwrap_or_default());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref(), cli.input, cli.output)?;
    init_logging(cli.verbose, &settings);

    match cli.command {
        Commands::Catalog { json } => {
            pipeline_command(settings.pipeline()?, PipelineStage::Catalog, json).await
        }
        Commands::Events { json } => {
            pipeline_command(settings.pipeline()?, PipelineStage::Events, json).await
        }
        Commands::Run { json } => {
            pipeline_command(settings.pipeline()?, PipelineStage::All, json).await
        }
        Commands::Query { sql, format } => {
            let lake = Lake::open(&settings.output()?)?;
            query_command(&lake, &sql, format).await
        }
        Commands::Warehouse { action } => warehouse_command(settings.warehouse()?, action).await,
    }
}
