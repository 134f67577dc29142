//! Rowshift
//!
//! Moves rows flagged for export from an operational MySQL database into a
//! Redshift warehouse through delimited staging files.

pub mod config;
pub mod connection;
pub mod error;
pub mod etl;

// Re-exports for convenience
pub use config::{PipelineConfig, Settings};
pub use connection::{
    BulkLoader, Connection, ConnectionParams, MySqlConnection, RedshiftConnection, RowCursor,
    RowSource,
};
pub use error::{ConnectionError, ExportError, ImportError, PipelineError, TransformError};
pub use etl::{ColumnRewriter, Exporter, Importer, Pipeline, RunSummary, Transformer};
