use std::fmt::Display;
use std::str::FromStr;

use hashbrown::HashMap;
use thiserror::Error;

use crate::data_structs::{
    CoverageRecord,
    Genotype,
    VariantRecord,
};

/// Columns holding identifiers or allele strings. Their cells are kept as
/// text when loaded from a delimited dump, so `007` stays `007`.
pub const TEXT_COLUMNS: &[&str] = &["sample", "chr", "ref", "alt", "genotype"];

/// A single cell value as returned by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

impl Value {
    /// Infers the narrowest value type for a raw text cell.
    pub fn infer(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "." || raw.eq_ignore_ascii_case("null") {
            Value::Null
        }
        else if let Ok(int) = raw.parse::<i64>() {
            Value::Int(int)
        }
        else if let Ok(float) = raw.parse::<f64>() {
            Value::Float(float)
        }
        else {
            Value::Text(raw.to_string())
        }
    }

    /// Raw text cell without type inference. Only an empty cell is null.
    pub fn text_cell(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Value::Null
        }
        else {
            Value::Text(raw.to_string())
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Null => "null",
        }
    }

    /// Text view of the value. Numbers are rendered, since names such as
    /// chromosome `1` or numeric sample ids are stored as text upstream.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Null => None,
        }
    }
}

impl Display for Value {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("column '{column}' holds {found}, expected {expected}")]
    TypeMismatch {
        column:   &'static str,
        expected: &'static str,
        found:    &'static str,
    },

    #[error("column '{column}' value {value} is out of range")]
    OutOfRange {
        column: &'static str,
        value:  String,
    },
}

/// A result row: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S: Into<String>>(
        mut self,
        column: S,
        value: Value,
    ) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert<S: Into<String>>(
        &mut self,
        column: S,
        value: Value,
    ) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(
        &self,
        column: &str,
    ) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn required(
        &self,
        column: &'static str,
    ) -> Result<&Value, RowError> {
        match self.columns.get(column) {
            None | Some(Value::Null) => Err(RowError::MissingColumn(column)),
            Some(value) => Ok(value),
        }
    }

    pub fn text(
        &self,
        column: &'static str,
    ) -> Result<String, RowError> {
        self.required(column)?
            .as_text()
            .ok_or(RowError::MissingColumn(column))
    }

    pub fn optional_text(
        &self,
        column: &str,
    ) -> Option<String> {
        self.columns.get(column).and_then(Value::as_text)
    }

    pub fn uint(
        &self,
        column: &'static str,
    ) -> Result<u64, RowError> {
        match self.required(column)? {
            Value::Int(i) => {
                u64::try_from(*i).map_err(|_| {
                    RowError::OutOfRange {
                        column,
                        value: i.to_string(),
                    }
                })
            },
            other => {
                Err(RowError::TypeMismatch {
                    column,
                    expected: "int",
                    found: other.type_name(),
                })
            },
        }
    }

    pub fn float(
        &self,
        column: &'static str,
    ) -> Result<f64, RowError> {
        match self.required(column)? {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => {
                Err(RowError::TypeMismatch {
                    column,
                    expected: "float",
                    found: other.type_name(),
                })
            },
        }
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Records that can be read from a keyspace table.
pub trait FromRow: Sized + Send {
    /// Columns selected from the table, in query order.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row) -> Result<Self, RowError>;
}

impl FromRow for VariantRecord {
    const COLUMNS: &'static [&'static str] =
        &["sample", "chr", "pos", "ref", "alt", "quality", "genotype"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        let genotype = row
            .optional_text("genotype")
            .map(|g| Genotype::from_str(&g).unwrap_or_default())
            .unwrap_or_default();
        Ok(VariantRecord {
            sample_id: row.text("sample")?,
            chromosome: row.text("chr")?,
            position: row.uint("pos")?,
            ref_allele: row.text("ref")?,
            alt_allele: row.text("alt")?,
            quality_score: row.float("quality")?,
            genotype,
        })
    }
}

impl FromRow for CoverageRecord {
    const COLUMNS: &'static [&'static str] =
        &["sample", "chr", "pos", "depth", "mapq"];

    fn from_row(row: &Row) -> Result<Self, RowError> {
        let depth = row.uint("depth")?;
        let depth = u32::try_from(depth).map_err(|_| {
            RowError::OutOfRange {
                column: "depth",
                value:  depth.to_string(),
            }
        })?;
        Ok(CoverageRecord {
            sample_id: row.text("sample")?,
            chromosome: row.text("chr")?,
            position: row.uint("pos")?,
            depth,
            mapping_quality: row.float("mapq")?,
        })
    }
}
