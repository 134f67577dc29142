//! Pipeline orchestration: export, transform, import

use super::{ColumnRewriter, Exporter, Importer, Transformer, transform_file};
use crate::config::PipelineConfig;
use crate::connection::{BulkLoader, Connection, RowSource};
use crate::error::{PipelineError, error_chain};
use owo_colors::OwoColorize;

/// Counts from a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Rows written to the exported file
    pub exported: usize,
    /// Lines written to the transformed file
    pub transformed: usize,
    /// Rows the warehouse reports as loaded
    pub imported: u64,
}

/// Moves flagged rows from a source database into a warehouse table
///
/// # Type Parameters
/// - `S`: source connection, its sessions run the export query
/// - `W`: warehouse connection, its sessions bulk-load the transformed file
/// - `T`: line transformer for the transform stage, [`ColumnRewriter`] by default
///
/// Stages run strictly in order. Each connection is opened only for the
/// stage that needs it and is closed again when that stage ends, whether
/// it succeeded or not.
///
/// # Example
/// ```no_run
/// use rowshift::config::{PipelineConfig, Settings};
/// use rowshift::connection::{MySqlConnection, RedshiftConnection};
/// use rowshift::etl::Pipeline;
///
/// # async fn example() -> eyre::Result<()> {
/// let settings = Settings::from_env();
/// let mut pipeline = Pipeline::new(
///     MySqlConnection::new(settings.source),
///     RedshiftConnection::new(settings.warehouse),
///     PipelineConfig::default(),
/// );
/// pipeline.run().await;
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<S, W, T = ColumnRewriter> {
    source: S,
    warehouse: W,
    config: PipelineConfig,
    exporter: Exporter,
    transformer: T,
    importer: Importer,
}

impl<S, W> Pipeline<S, W>
where
    S: Connection,
    S::Session: RowSource,
    W: Connection,
    W::Session: BulkLoader,
{
    /// Create a new pipeline using the default column rewrite
    pub fn new(source: S, warehouse: W, config: PipelineConfig) -> Self {
        Self {
            exporter: Exporter::new(config.delimiter),
            transformer: ColumnRewriter::default().with_delimiter(config.delimiter),
            importer: Importer::new(config.delimiter),
            source,
            warehouse,
            config,
        }
    }
}

impl<S, W, T> Pipeline<S, W, T>
where
    S: Connection,
    S::Session: RowSource,
    W: Connection,
    W::Session: BulkLoader,
    T: Transformer<Input = String, Output = String>,
{
    /// Replace the line transformer used by the transform stage
    pub fn with_transformer<U>(self, transformer: U) -> Pipeline<S, W, U>
    where
        U: Transformer<Input = String, Output = String>,
    {
        Pipeline {
            source: self.source,
            warehouse: self.warehouse,
            config: self.config,
            exporter: self.exporter,
            transformer,
            importer: self.importer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Run the whole pipeline, logging instead of returning failures
    ///
    /// Callers cannot observe the outcome except through the log. Use
    /// [`Pipeline::execute`] to get the result.
    pub async fn run(&mut self) {
        match self.execute().await {
            Ok(summary) => log::info!(
                "Pipeline complete: exported {}, transformed {}, imported {}",
                summary.exported.cyan(),
                summary.transformed.cyan(),
                summary.imported.cyan()
            ),
            Err(e) => log::error!("Error: {}", error_chain(&e)),
        }
    }

    /// Run the whole pipeline
    ///
    /// Steps:
    /// 1. Connect to the source, export the query result, disconnect
    /// 2. Transform the exported file
    /// 3. Connect to the warehouse, import the transformed file, disconnect
    ///
    /// # Errors
    /// Returns the first stage failure; later stages are not attempted.
    pub async fn execute(&mut self) -> Result<RunSummary, PipelineError> {
        log::info!("Starting pipeline");

        let exported = self.export_stage().await?;
        let transformed = self.transform_stage().await?;
        let imported = self.import_stage().await?;

        Ok(RunSummary {
            exported,
            transformed,
            imported,
        })
    }

    /// Export the source query result to the exported file
    pub async fn export_stage(&mut self) -> Result<usize, PipelineError> {
        log::debug!(
            "Exporting from {} to {}",
            self.source.backend(),
            self.config.exported_path.display().bright_black()
        );
        let session = self.source.connect().await?;
        let result = self
            .exporter
            .export(session, &self.config.query, &self.config.exported_path)
            .await;
        self.source.disconnect().await;
        Ok(result?)
    }

    /// Rewrite the exported file into the transformed file
    pub async fn transform_stage(&mut self) -> Result<usize, PipelineError> {
        let count = transform_file(
            &self.config.exported_path,
            &self.config.transformed_path,
            &self.transformer,
        )
        .await?;
        Ok(count)
    }

    /// Load the transformed file into the warehouse table
    pub async fn import_stage(&mut self) -> Result<u64, PipelineError> {
        log::debug!(
            "Importing {} into {} table {}",
            self.config.transformed_path.display().bright_black(),
            self.warehouse.backend(),
            self.config.table
        );
        let session = self.warehouse.connect().await?;
        let result = self
            .importer
            .import(session, &self.config.transformed_path, &self.config.table)
            .await;
        self.warehouse.disconnect().await;
        Ok(result?)
    }
}
