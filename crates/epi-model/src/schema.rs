//! Output schema of a pipeline chain.
//!
//! A [`Schema`] is an ordered list of column names and their declared
//! [`ColumnType`]. Column order matters: it is both the output column order
//! and the sort order of the final table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// Declared type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnType {
    /// 64-bit integer where missing values stay null.
    NullableInt,
    /// 64-bit float where missing values stay null.
    Float,
    /// Text; missing values are rendered as the empty string.
    String,
}

impl ColumnType {
    /// Parse a dtype name as it appears in chain configuration files.
    ///
    /// Accepted names are `int`, `Int64`, `nullable-int`, `float`, `str` and
    /// `string`. Anything else is a configuration error.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            "int" | "Int64" | "nullable-int" => Ok(Self::NullableInt),
            "float" => Ok(Self::Float),
            "str" | "string" => Ok(Self::String),
            other => Err(ModelError::UnsupportedDtype(other.to_string())),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::NullableInt | Self::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NullableInt => "nullable-int",
            Self::Float => "float",
            Self::String => "string",
        }
    }
}

impl FromStr for ColumnType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub dtype: ColumnType,
}

/// Ordered mapping of column name to [`ColumnType`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(name, dtype name)` pairs, rejecting unknown
    /// dtypes and duplicate columns.
    pub fn from_pairs<I, N, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let mut schema = Self::new();
        for (name, dtype) in pairs {
            schema.push(name, ColumnType::parse(dtype.as_ref())?)?;
        }
        Ok(schema)
    }

    /// Append a column. Fails if the column is already declared.
    pub fn push(&mut self, name: impl Into<String>, dtype: ColumnType) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ModelError::DuplicateColumn(name));
        }
        self.columns.push(SchemaColumn { name, dtype });
        Ok(())
    }

    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, dtype: ColumnType) -> Self {
        let name = name.into();
        if !self.contains(&name) {
            self.columns.push(SchemaColumn { name, dtype });
        }
        self
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.dtype)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
