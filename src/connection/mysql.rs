//! MySQL source backend

use super::{Connection, ConnectionParams, RowCursor, RowSource};
use crate::error::{BoxError, ConnectionError};
use crate::etl::{Field, Row};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, QueryResult, TextProtocol, Value};
use owo_colors::OwoColorize;

const BACKEND: &str = "MySQL";
const DEFAULT_PORT: u16 = 3306;

/// Connection to the operational MySQL database
pub struct MySqlConnection {
    params: ConnectionParams,
    session: Option<MySqlSession>,
}

impl MySqlConnection {
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            session: None,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn opts(&self) -> Result<OptsBuilder, ConnectionError> {
        let host = self.params.require_host(BACKEND)?;
        let port = self.params.parse_port(BACKEND)?.unwrap_or(DEFAULT_PORT);
        Ok(OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(self.params.user.clone())
            .pass(self.params.password.clone())
            .db_name(self.params.database.clone()))
    }
}

impl Connection for MySqlConnection {
    type Session = MySqlSession;

    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn connect(&mut self) -> Result<&mut MySqlSession, ConnectionError> {
        self.disconnect().await;

        let opts = self.opts().inspect_err(|e| {
            log::error!("Error connecting to MySQL: {}", e);
        })?;

        let conn = Conn::new(opts).await.map_err(|e| {
            log::error!("Error connecting to MySQL: {}", e);
            ConnectionError::Connect {
                backend: BACKEND,
                host: self.params.host_display().to_string(),
                source: Box::new(e),
            }
        })?;

        log::info!(
            "Connected to MySQL database at {}",
            self.params.host_display().bright_black()
        );
        Ok(self.session.insert(MySqlSession { conn }))
    }

    fn session_mut(&mut self) -> Option<&mut MySqlSession> {
        self.session.as_mut()
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            match session.conn.disconnect().await {
                Ok(()) => log::info!("Disconnected from {}", self.params.host_display()),
                Err(e) => log::warn!(
                    "Error while disconnecting from {}: {}",
                    self.params.host_display(),
                    e
                ),
            }
        }
    }
}

/// Open MySQL session
pub struct MySqlSession {
    conn: Conn,
}

impl RowSource for MySqlSession {
    type Rows<'a> = MySqlRows<'a>;

    async fn query<'a>(&'a mut self, query: &'a str) -> Result<MySqlRows<'a>, BoxError> {
        log::debug!("Executing query: {}", query.bright_blue());
        let result = self.conn.query_iter(query).await?;
        Ok(MySqlRows { result })
    }
}

/// Rows of a text-protocol result, read from the wire as they are requested
pub struct MySqlRows<'a> {
    result: QueryResult<'a, 'static, TextProtocol>,
}

impl RowCursor for MySqlRows<'_> {
    async fn next_row(&mut self) -> Result<Option<Row>, BoxError> {
        let Some(row) = self.result.next().await? else {
            return Ok(None);
        };
        Ok(Some(
            row.unwrap_raw()
                .into_iter()
                .map(|value| value.map_or(Field::Null, field_from_value))
                .collect(),
        ))
    }
}

/// Convert a MySQL protocol value to its textual field form
fn field_from_value(value: Value) -> Field {
    match value {
        Value::NULL => Field::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Field::Text(text),
            Err(e) => Field::Bytes(e.into_bytes()),
        },
        Value::Int(n) => Field::Int(n),
        Value::UInt(n) => Field::UInt(n),
        Value::Float(n) => Field::Float(f64::from(n)),
        Value::Double(n) => Field::Float(n),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Field::Text(text)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = u64::from(days) * 24 + u64::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                hours,
                minutes,
                seconds
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Field::Text(text)
        }
    }
}
