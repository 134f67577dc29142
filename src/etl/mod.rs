//! Pipeline stages
//!
//! Rows are exported from the source into a delimited file, the file is
//! rewritten line by line, and the result is bulk-loaded into the warehouse.

mod extract;
mod load;
mod pipeline;
mod row;
mod transform;

pub use extract::Exporter;
pub use load::Importer;
pub use pipeline::{Pipeline, RunSummary};
pub use row::{Field, Row, encode_line};
pub use transform::{ColumnRewriter, Transformer, transform_file};
