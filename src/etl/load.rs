//! Import stage: bulk-load a delimited file into a warehouse table

use crate::connection::BulkLoader;
use crate::error::ImportError;
use owo_colors::OwoColorize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Bulk-loads a delimited file into a table
///
/// The first line of the file is always discarded as a header, whether or
/// not it is one. Everything after it is streamed into the backend's bulk
/// copy and committed. A failed load is not rolled back here; the open
/// transaction is left to the connection.
///
/// An empty file is not an error: there is no first line to drop, the copy
/// receives no data and the (empty) load is committed, reporting 0 rows.
#[derive(Debug, Clone)]
pub struct Importer {
    delimiter: char,
}

impl Default for Importer {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl Importer {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Load `path` into `table` through `session`
    ///
    /// Returns the number of rows the backend reports as loaded.
    ///
    /// # Errors
    /// Returns [`ImportError`] if the file cannot be read, or the copy or
    /// commit fails.
    pub async fn import<S>(
        &self,
        session: &mut S,
        path: impl AsRef<Path>,
        table: &str,
    ) -> Result<u64, ImportError>
    where
        S: BulkLoader,
    {
        let path = path.as_ref();
        let result = self.import_inner(session, path, table).await;
        match &result {
            Ok(count) => log::info!("Imported {} rows into {}", count.cyan(), table.bright_black()),
            Err(e) => log::error!("Error importing data: {}", crate::error::error_chain(e)),
        }
        result
    }

    async fn import_inner<S>(
        &self,
        session: &mut S,
        path: &Path,
        table: &str,
    ) -> Result<u64, ImportError>
    where
        S: BulkLoader,
    {
        let read_err = |source: std::io::Error| ImportError::Read {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(read_err)?;
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        reader.read_line(&mut header).await.map_err(read_err)?;
        log::debug!("Skipped first line of {}: {:?}", path.display(), header.trim_end());

        let count = session
            .copy_from(table, self.delimiter, reader)
            .await
            .map_err(|source| ImportError::Copy {
                table: table.to_string(),
                source,
            })?;

        session
            .commit()
            .await
            .map_err(|source| ImportError::Commit {
                table: table.to_string(),
                source,
            })?;

        Ok(count)
    }
}
