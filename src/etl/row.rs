//! Row values and the delimited line format

use std::fmt;

/// A single column value as returned by a query
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(n) => write!(f, "{}", n),
            Self::UInt(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// An ordered sequence of column values
pub type Row = Vec<Field>;

/// Join the textual form of each field with `delimiter`
///
/// Fields are not quoted or escaped, so a value containing the delimiter
/// produces extra fields when the line is read back. [`Field::Null`] is
/// written as an empty field, which text `COPY` loads as an empty string
/// rather than NULL.
pub fn encode_line(row: &[Field], delimiter: char) -> String {
    let mut line = String::new();
    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            line.push(delimiter);
        }
        line.push_str(&field.to_string());
    }
    line
}
