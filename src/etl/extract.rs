//! Export stage: query results to a delimited file

use super::row::encode_line;
use crate::connection::{RowCursor, RowSource};
use crate::error::{BoxError, ExportError};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes the full result set of a query to a delimited text file
///
/// Each row becomes one newline-terminated line, fields joined by the
/// delimiter in column order. Rows are written as the cursor yields them, so
/// the result set is never held in memory. An existing file is overwritten.
/// On failure a partially written file is left in place.
///
/// # Example
/// ```no_run
/// use rowshift::connection::{Connection, ConnectionParams, MySqlConnection};
/// use rowshift::etl::Exporter;
///
/// # async fn example() -> eyre::Result<()> {
/// let mut source = MySqlConnection::new(ConnectionParams::default());
/// let session = source.connect().await?;
/// let rows = Exporter::default()
///     .export(session, "SELECT * FROM Data", "data_files/exported.dat")
///     .await?;
/// source.disconnect().await;
/// println!("Exported {} rows", rows);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Exporter {
    delimiter: char,
}

impl Default for Exporter {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl Exporter {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Run `query` on `session` and write every row to `path`
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns [`ExportError`] if the query, directory creation or any write fails.
    pub async fn export<S>(
        &self,
        session: &mut S,
        query: &str,
        path: impl AsRef<Path>,
    ) -> Result<usize, ExportError>
    where
        S: RowSource,
    {
        let path = path.as_ref();
        let result = self.export_inner(session, query, path).await;
        match &result {
            Ok(count) => log::info!(
                "Exported {} rows to {}",
                count.cyan(),
                path.display().bright_black()
            ),
            Err(e) => log::error!("Error exporting data: {}", crate::error::error_chain(e)),
        }
        result
    }

    async fn export_inner<S>(
        &self,
        session: &mut S,
        query: &str,
        path: &Path,
    ) -> Result<usize, ExportError>
    where
        S: RowSource,
    {
        let query_err = |source: BoxError| ExportError::Query {
            query: query.to_string(),
            source,
        };
        let mut rows = session.query(query).await.map_err(query_err)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ExportError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let write_err = |source: std::io::Error| ExportError::Write {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::create(path).await.map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;
        while let Some(row) = rows.next_row().await.map_err(query_err)? {
            let mut line = encode_line(&row, self.delimiter);
            line.push('\n');
            writer.write_all(line.as_bytes()).await.map_err(write_err)?;
            count += 1;
        }
        writer.flush().await.map_err(write_err)?;

        Ok(count)
    }
}
