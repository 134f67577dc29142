//! Redshift warehouse backend, spoken over the PostgreSQL wire protocol

use super::{BulkLoader, Connection, ConnectionParams};
use crate::error::{BoxError, ConnectionError};
use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

const BACKEND: &str = "Redshift";

/// Bytes buffered before a chunk is sent to the server during COPY
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Connection to the Redshift warehouse
pub struct RedshiftConnection {
    params: ConnectionParams,
    session: Option<RedshiftSession>,
}

impl RedshiftConnection {
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            session: None,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn config(&self) -> Result<tokio_postgres::Config, ConnectionError> {
        let host = self.params.require_host(BACKEND)?;
        let mut config = tokio_postgres::Config::new();
        config.host(host);
        if let Some(port) = self.params.parse_port(BACKEND)? {
            config.port(port);
        }
        if let Some(user) = &self.params.user {
            config.user(user);
        }
        if let Some(password) = &self.params.password {
            config.password(password);
        }
        if let Some(database) = &self.params.database {
            config.dbname(database);
        }
        Ok(config)
    }
}

impl Connection for RedshiftConnection {
    type Session = RedshiftSession;

    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn connect(&mut self) -> Result<&mut RedshiftSession, ConnectionError> {
        self.disconnect().await;

        let config = self.config().inspect_err(|e| {
            log::error!("Error connecting to Redshift: {}", e);
        })?;

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            log::error!("Error connecting to Redshift: {}", e);
            ConnectionError::Connect {
                backend: BACKEND,
                host: self.params.host_display().to_string(),
                source: Box::new(e),
            }
        })?;

        // The connection object drives the socket and must be polled
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("Redshift connection error: {}", e);
            }
        });

        log::info!(
            "Connected to Redshift database at {}",
            self.params.host_display().bright_black()
        );
        Ok(self.session.insert(RedshiftSession { client, driver }))
    }

    fn session_mut(&mut self) -> Option<&mut RedshiftSession> {
        self.session.as_mut()
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            // Dropping the client ends the driver task
            drop(session.client);
            if let Err(e) = session.driver.await {
                log::warn!(
                    "Error while disconnecting from {}: {}",
                    self.params.host_display(),
                    e
                );
            }
            log::info!("Disconnected from {}", self.params.host_display());
        }
    }
}

/// Open Redshift session
pub struct RedshiftSession {
    client: Client,
    driver: JoinHandle<()>,
}

/// `COPY` statement equivalent to a plain delimited-text bulk load
pub(crate) fn copy_statement(table: &str, delimiter: char) -> String {
    format!("COPY {} FROM STDIN WITH DELIMITER AS '{}'", table, delimiter)
}

impl BulkLoader for RedshiftSession {
    async fn copy_from<R>(
        &mut self,
        table: &str,
        delimiter: char,
        mut reader: R,
    ) -> Result<u64, BoxError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        // COPY runs inside an explicit transaction that only commit() ends
        self.client.batch_execute("BEGIN").await?;

        let statement = copy_statement(table, delimiter);
        log::debug!("Executing: {}", statement.bright_blue());
        let sink = self.client.copy_in::<_, Bytes>(statement.as_str()).await?;
        let mut sink = std::pin::pin!(sink);

        let mut chunk = BytesMut::with_capacity(COPY_CHUNK_SIZE);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            chunk.extend_from_slice(&line);
            if chunk.len() >= COPY_CHUNK_SIZE {
                sink.send(chunk.split().freeze()).await?;
            }
        }
        if !chunk.is_empty() {
            sink.send(chunk.freeze()).await?;
        }

        let rows = sink.as_mut().finish().await?;
        Ok(rows)
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }
}
