//! Database sessions for both ends of the pipeline.
//!
//! A [`Connection`] owns at most one open session against its backend. Source
//! backends hand out sessions implementing [`RowSource`]; warehouse backends
//! hand out sessions implementing [`BulkLoader`]. The pipeline is generic over
//! both, so adding a backend never touches the orchestrator.

mod mysql;
mod redshift;

pub use mysql::{MySqlConnection, MySqlRows, MySqlSession};
pub use redshift::{RedshiftConnection, RedshiftSession};

use crate::error::{BoxError, ConnectionError};
use crate::etl::Row;
use std::future::Future;
use tokio::io::AsyncBufRead;

/// Host, credentials and database for one backend session
///
/// Every field is optional so configuration can be loaded without
/// validation. The backend decides what it needs when connecting.
#[derive(Clone, Default, PartialEq)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Port as configured; parsed by the backend when connecting
    pub port: Option<String>,
}

impl ConnectionParams {
    /// Host for log lines, `<unset>` when missing
    pub fn host_display(&self) -> &str {
        self.host.as_deref().unwrap_or("<unset>")
    }

    pub(crate) fn require_host(&self, backend: &'static str) -> Result<&str, ConnectionError> {
        self.host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or(ConnectionError::MissingParameter {
                backend,
                name: "host",
            })
    }

    /// Configured port, `None` when unset or blank
    pub(crate) fn parse_port(&self, backend: &'static str) -> Result<Option<u16>, ConnectionError> {
        let Some(value) = self.port.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        value
            .parse::<u16>()
            .map(Some)
            .map_err(|source| ConnectionError::InvalidParameter {
                backend,
                name: "port",
                value: value.to_string(),
                source: Box::new(source),
            })
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("database", &self.database)
            .field("port", &self.port)
            .finish()
    }
}

/// Open/close capability shared by every backend
///
/// `disconnect` is idempotent: calling it on a connection that was never
/// opened, or was already closed, does nothing.
pub trait Connection: Send {
    /// Handle to an open session
    type Session: Send;

    /// Human-readable backend name used in logs and errors
    fn backend(&self) -> &'static str;

    /// Open a session, replacing any previous one
    ///
    /// # Errors
    /// Returns [`ConnectionError`] carrying the client library's failure.
    fn connect(
        &mut self,
    ) -> impl Future<Output = Result<&mut Self::Session, ConnectionError>> + Send;

    /// The open session, if any
    fn session_mut(&mut self) -> Option<&mut Self::Session>;

    fn is_connected(&self) -> bool;

    /// Close the open session, if any
    ///
    /// Errors while closing are logged, never returned.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// A session that can run a query and hand back its rows one at a time
pub trait RowSource: Send {
    /// Cursor over the result set, borrowing the session
    type Rows<'a>: RowCursor
    where
        Self: 'a;

    /// Execute `query` as-is (no parameter binding)
    fn query<'a>(
        &'a mut self,
        query: &'a str,
    ) -> impl Future<Output = Result<Self::Rows<'a>, BoxError>> + Send + 'a;
}

/// Forward-only cursor over a query result
pub trait RowCursor: Send {
    /// The next row, or `None` once the result set is exhausted
    fn next_row(&mut self) -> impl Future<Output = Result<Option<Row>, BoxError>> + Send;
}

/// Rows already held in memory
impl RowCursor for std::vec::IntoIter<Row> {
    async fn next_row(&mut self) -> Result<Option<Row>, BoxError> {
        Ok(self.next())
    }
}

/// A session that can bulk-copy delimited text into a table
pub trait BulkLoader: Send {
    /// Stream `reader` into `table` using the backend's native bulk copy
    ///
    /// Returns the number of rows the backend reports as loaded. The load
    /// is not visible until [`BulkLoader::commit`] succeeds.
    fn copy_from<R>(
        &mut self,
        table: &str,
        delimiter: char,
        reader: R,
    ) -> impl Future<Output = Result<u64, BoxError>> + Send
    where
        R: AsyncBufRead + Unpin + Send;

    /// Commit the work done since the last commit
    fn commit(&mut self) -> impl Future<Output = Result<(), BoxError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::Field;

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParams {
            host: Some("db".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", params);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn test_require_host() {
        let params = ConnectionParams::default();
        assert!(matches!(
            params.require_host("MySQL"),
            Err(ConnectionError::MissingParameter { name: "host", .. })
        ));

        let params = ConnectionParams {
            host: Some("db".to_string()),
            ..Default::default()
        };
        assert_eq!(params.require_host("MySQL").unwrap(), "db");
        assert_eq!(params.host_display(), "db");
    }

    #[test]
    fn test_parse_port() {
        let mut params = ConnectionParams::default();
        assert_eq!(params.parse_port("Redshift").unwrap(), None);

        params.port = Some(" 5439 ".to_string());
        assert_eq!(params.parse_port("Redshift").unwrap(), Some(5439));

        params.port = Some("".to_string());
        assert_eq!(params.parse_port("Redshift").unwrap(), None);

        params.port = Some("abc".to_string());
        let err = params.parse_port("Redshift").unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::InvalidParameter {
                backend: "Redshift",
                name: "port",
                ref value,
                ..
            } if value == "abc"
        ));
    }

    #[tokio::test]
    async fn test_in_memory_cursor_yields_rows_in_order() {
        let mut rows = vec![vec![Field::Int(1)], vec![Field::Int(2)]].into_iter();
        assert_eq!(rows.next_row().await.unwrap(), Some(vec![Field::Int(1)]));
        assert_eq!(rows.next_row().await.unwrap(), Some(vec![Field::Int(2)]));
        assert_eq!(rows.next_row().await.unwrap(), None);
    }
}
