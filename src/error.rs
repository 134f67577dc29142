//! Error types for each pipeline stage
//!
//! Every stage has its own error enum so failures can be told apart by the
//! stage that raised them. Each variant keeps the underlying cause as its
//! `source`, so the whole chain is available when the error is logged.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause from a database client library
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while opening a database session
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("{backend} connection is missing required parameter `{name}`")]
    MissingParameter {
        backend: &'static str,
        name: &'static str,
    },

    #[error("{backend} connection parameter `{name}` is invalid: {value:?}")]
    InvalidParameter {
        backend: &'static str,
        name: &'static str,
        value: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to connect to {backend} at {host}")]
    Connect {
        backend: &'static str,
        host: String,
        #[source]
        source: BoxError,
    },
}

/// Errors raised while exporting query results to a file
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("query failed: {query}")]
    Query {
        query: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while rewriting a delimited file
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("found {found} fields, at least {required} are required")]
    TooFewFields { found: usize, required: usize },

    #[error("malformed line {line}")]
    Line {
        line: usize,
        #[source]
        source: Box<TransformError>,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransformError {
    /// Attach the 1-based line number the error was raised on
    pub fn at_line(self, line: usize) -> Self {
        Self::Line {
            line,
            source: Box::new(self),
        }
    }
}

/// Errors raised while bulk-loading a file into a table
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bulk copy into {table} failed")]
    Copy {
        table: String,
        #[source]
        source: BoxError,
    },

    #[error("commit after loading {table} failed")]
    Commit {
        table: String,
        #[source]
        source: BoxError,
    },
}

/// Any failure of a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Render an error and all of its sources as `outer: inner: root`
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let error = ExportError::Write {
            path: PathBuf::from("data_files/exported.dat"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(
            error_chain(&error),
            "failed to write data_files/exported.dat: disk full"
        );
    }

    #[test]
    fn test_pipeline_error_is_transparent() {
        let error = PipelineError::from(
            TransformError::TooFewFields {
                found: 2,
                required: 3,
            }
            .at_line(3),
        );
        assert_eq!(error.to_string(), "malformed line 3");
        assert_eq!(
            error_chain(&error),
            "malformed line 3: found 2 fields, at least 3 are required"
        );
        assert!(matches!(error, PipelineError::Transform(_)));
    }

    #[test]
    fn test_connection_error_keeps_cause() {
        let error = ConnectionError::Connect {
            backend: "MySQL",
            host: "db.internal".to_string(),
            source: "access denied".into(),
        };
        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("access denied"));
    }
}
