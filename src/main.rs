use clap::{Parser, Subcommand, builder::styling};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use rowshift::{MySqlConnection, Pipeline, PipelineConfig, RedshiftConnection, Settings};
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Rowshift: move flagged rows from MySQL into Redshift
#[derive(Parser)]
#[command(name = "rowshift", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Query run against the source database
    #[arg(long, global = true, default_value = PipelineConfig::DEFAULT_QUERY)]
    query: String,

    /// File the export stage writes
    #[arg(long, global = true, default_value = PipelineConfig::DEFAULT_EXPORTED_PATH)]
    exported: PathBuf,

    /// File the transform stage writes
    #[arg(long, global = true, default_value = PipelineConfig::DEFAULT_TRANSFORMED_PATH)]
    transformed: PathBuf,

    /// Warehouse table to load into
    #[arg(long, global = true, default_value = PipelineConfig::DEFAULT_TABLE)]
    table: String,

    /// Command to execute (defaults to `run`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Export, transform and import in one go
    Run,
    /// Export flagged rows from the source database to the exported file
    Export,
    /// Rewrite the exported file into the transformed file
    Transform,
    /// Load the transformed file into the warehouse table
    Import,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenv {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {
            log::debug!("No {} file found, using process environment", cli.env)
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to load {}", cli.env)),
    }

    let settings = Settings::from_env();
    let config = PipelineConfig {
        query: cli.query,
        exported_path: cli.exported,
        transformed_path: cli.transformed,
        table: cli.table,
        ..PipelineConfig::default()
    };

    let mut pipeline = Pipeline::new(
        MySqlConnection::new(settings.source),
        RedshiftConnection::new(settings.warehouse),
        config,
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            log::info!("Running pipeline");
            pipeline.run().await;
        }
        Commands::Export => {
            log::info!(
                "Exporting to {}",
                pipeline.config().exported_path.display().bright_black()
            );
            pipeline.export_stage().await?;
        }
        Commands::Transform => {
            log::info!(
                "Transforming {} into {}",
                pipeline.config().exported_path.display().bright_black(),
                pipeline.config().transformed_path.display().bright_black()
            );
            pipeline.transform_stage().await?;
        }
        Commands::Import => {
            log::info!(
                "Importing {} into {}",
                pipeline.config().transformed_path.display().bright_black(),
                pipeline.config().table.cyan()
            );
            pipeline.import_stage().await?;
        }
    }

    Ok(())
}
