//! Transform stage: per-line column rewrite

use crate::error::TransformError;
use owo_colors::OwoColorize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Transformer trait for transforming data items
///
/// Implementors define how a single item is rewritten. Errors abort the
/// whole transform; there is no partial-success mode. [`transform_file`]
/// drives any line transformer (`Input = Output = String`) over a file and
/// attaches the line number to the error.
///
/// # Example
/// ```no_run
/// use rowshift::etl::Transformer;
/// use rowshift::error::TransformError;
///
/// struct Lowercase;
///
/// impl Transformer for Lowercase {
///     type Input = String;
///     type Output = String;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output, TransformError> {
///         Ok(input.to_lowercase())
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if the item cannot be transformed
    fn transform(&self, input: Self::Input) -> Result<Self::Output, TransformError>;

    /// Transform multiple items (default batch implementation)
    ///
    /// A failure is wrapped in [`TransformError::Line`] with the 1-based
    /// position of the item that failed.
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>, TransformError> {
        inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| self.transform(input).map_err(|e| e.at_line(i + 1)))
            .collect()
    }
}

/// Overwrites one column with another column's upper-cased value plus a suffix
///
/// With the default settings a line `a,b,c` becomes `a,C_,c`: field 1 is
/// replaced, field 2 is left as it was. Lines with fewer fields than needed
/// are rejected.
#[derive(Debug, Clone)]
pub struct ColumnRewriter {
    delimiter: char,
    target: usize,
    source: usize,
    suffix: String,
}

impl Default for ColumnRewriter {
    fn default() -> Self {
        Self {
            delimiter: ',',
            target: 1,
            source: 2,
            suffix: "_".to_string(),
        }
    }
}

impl ColumnRewriter {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Fields a line needs for the rewrite to apply
    pub fn required_fields(&self) -> usize {
        self.target.max(self.source) + 1
    }

    /// Rewrite one line
    pub fn rewrite(&self, line: &str) -> Result<String, TransformError> {
        let mut fields: Vec<String> = line
            .trim()
            .split(self.delimiter)
            .map(str::to_string)
            .collect();

        if fields.len() < self.required_fields() {
            return Err(TransformError::TooFewFields {
                found: fields.len(),
                required: self.required_fields(),
            });
        }

        fields[self.target] = format!("{}{}", fields[self.source].to_uppercase(), self.suffix);
        let separator = self.delimiter.to_string();
        Ok(fields.join(separator.as_str()))
    }
}

impl Transformer for ColumnRewriter {
    type Input = String;
    type Output = String;

    fn transform(&self, input: Self::Input) -> Result<Self::Output, TransformError> {
        self.rewrite(&input)
    }
}

/// Stream `input` through `transformer` line by line into `output`
///
/// Memory use is bounded by the longest line. Returns the number of lines
/// written. The first bad line aborts the transform; the output file may
/// then hold the lines before it.
///
/// # Errors
/// Returns [`TransformError`] on a malformed line or any I/O failure.
pub async fn transform_file<T>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    transformer: &T,
) -> Result<usize, TransformError>
where
    T: Transformer<Input = String, Output = String>,
{
    let input = input.as_ref();
    let output = output.as_ref();

    let result = transform_file_inner(input, output, transformer).await;
    match &result {
        Ok(count) => log::info!(
            "Transformed {} lines and saved to {}",
            count.cyan(),
            output.display().bright_black()
        ),
        Err(e) => log::error!("Error transforming data: {}", crate::error::error_chain(e)),
    }
    result
}

async fn transform_file_inner<T>(
    input: &Path,
    output: &Path,
    transformer: &T,
) -> Result<usize, TransformError>
where
    T: Transformer<Input = String, Output = String>,
{
    let read_err = |source: std::io::Error| TransformError::Read {
        path: input.to_path_buf(),
        source,
    };
    let write_err = |source: std::io::Error| TransformError::Write {
        path: output.to_path_buf(),
        source,
    };

    let infile = tokio::fs::File::open(input).await.map_err(read_err)?;
    let outfile = tokio::fs::File::create(output).await.map_err(write_err)?;

    let mut lines = BufReader::new(infile).lines();
    let mut writer = BufWriter::new(outfile);
    let mut count = 0;

    while let Some(line) = lines.next_line().await.map_err(read_err)? {
        let mut rewritten = transformer
            .transform(line)
            .map_err(|e| e.at_line(count + 1))?;
        rewritten.push('\n');
        writer
            .write_all(rewritten.as_bytes())
            .await
            .map_err(write_err)?;
        count += 1;
    }
    writer.flush().await.map_err(write_err)?;

    Ok(count)
}
