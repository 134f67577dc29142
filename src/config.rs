//! Runtime configuration
//!
//! Connection settings are read from the environment once at startup into a
//! [`Settings`] value that is handed to the pipeline. Nothing is cached in
//! process-wide state.

use crate::connection::ConnectionParams;
use std::path::PathBuf;

/// Connection settings for both ends of the pipeline
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Operational database rows are exported from
    pub source: ConnectionParams,
    /// Warehouse rows are imported into
    pub warehouse: ConnectionParams,
}

impl Settings {
    /// Load settings from process environment variables
    ///
    /// Expected environment variables (all optional):
    /// - DATABASE_HOST, DATABASE_USER, DATABASE_PASSWORD, DATABASE_NAME
    /// - RED_SHIFT_HOST, RED_SHIFT_PORT, RED_SHIFT_DBNAME, RED_SHIFT_USER, RED_SHIFT_PASSWORD
    ///
    /// Nothing is validated here. Missing or malformed values are rejected
    /// when the connection that uses them is opened.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings using an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = ConnectionParams {
            host: lookup("DATABASE_HOST"),
            user: lookup("DATABASE_USER"),
            password: lookup("DATABASE_PASSWORD"),
            database: lookup("DATABASE_NAME"),
            port: None,
        };

        let warehouse = ConnectionParams {
            host: lookup("RED_SHIFT_HOST"),
            user: lookup("RED_SHIFT_USER"),
            password: lookup("RED_SHIFT_PASSWORD"),
            database: lookup("RED_SHIFT_DBNAME"),
            port: lookup("RED_SHIFT_PORT"),
        };

        Self { source, warehouse }
    }
}

/// What the pipeline moves and where it stages files
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Query run against the source database
    pub query: String,
    /// File the export stage writes
    pub exported_path: PathBuf,
    /// File the transform stage writes
    pub transformed_path: PathBuf,
    /// Warehouse table the import stage loads into
    pub table: String,
    /// Field separator for both intermediate files
    pub delimiter: char,
}

impl PipelineConfig {
    pub const DEFAULT_QUERY: &'static str = "SELECT * FROM Data WHERE Flag = TRUE";
    pub const DEFAULT_EXPORTED_PATH: &'static str = "data_files/exported.dat";
    pub const DEFAULT_TRANSFORMED_PATH: &'static str = "data_files/transformed.dat";
    pub const DEFAULT_TABLE: &'static str = "Data";
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query: Self::DEFAULT_QUERY.to_string(),
            exported_path: PathBuf::from(Self::DEFAULT_EXPORTED_PATH),
            transformed_path: PathBuf::from(Self::DEFAULT_TRANSFORMED_PATH),
            table: Self::DEFAULT_TABLE.to_string(),
            delimiter: ',',
        }
    }
}
