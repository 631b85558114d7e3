//! Datasets
//!
//! This module defines the tabular data source consumed by the learners. A table is an ordered
//! list of typed columns, a row key per row and random access to every cell. Learners never
//! assume a particular storage, they only go through the [`Table`] trait, so callers may plug in
//! their own row stores. [`DataTable`] is the in-memory implementation shipped with the crate.
use std::fmt;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

mod impl_table;

pub use impl_table::DataTable;

/// Semantic type of a column
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Numeric,
    Nominal,
    /// Fixed width bit vector (fingerprint), every bit is a binary attribute
    BitVector,
    /// Fixed width byte vector, every position is an ordinal attribute
    ByteVector,
    /// Fixed width double vector, every position is a numeric attribute
    DoubleVector,
}

impl ColumnType {
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            ColumnType::BitVector | ColumnType::ByteVector | ColumnType::DoubleVector
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Nominal => "nominal",
            ColumnType::BitVector => "bit vector",
            ColumnType::ByteVector => "byte vector",
            ColumnType::DoubleVector => "double vector",
        };
        f.write_str(name)
    }
}

/// Name and type of a column, and optionally its declared possible values
///
/// Declared possible values fix the order of categories (and of classes, for a nominal target).
/// Without them the order of first appearance in the table is used.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    name: String,
    column_type: ColumnType,
    possible_values: Option<Vec<String>>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
            possible_values: None,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Numeric)
    }

    pub fn nominal(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Nominal)
    }

    /// Declares the possible values of a nominal column
    pub fn with_possible_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn possible_values(&self) -> Option<&[String]> {
        self.possible_values.as_deref()
    }
}

/// A single cell value
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Numeric(f64),
    Nominal(String),
    BitVector(Vec<bool>),
    ByteVector(Vec<u8>),
    DoubleVector(Vec<f64>),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// The column type this cell belongs to, `None` for missing cells
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Missing => None,
            Cell::Numeric(_) => Some(ColumnType::Numeric),
            Cell::Nominal(_) => Some(ColumnType::Nominal),
            Cell::BitVector(_) => Some(ColumnType::BitVector),
            Cell::ByteVector(_) => Some(ColumnType::ByteVector),
            Cell::DoubleVector(_) => Some(ColumnType::DoubleVector),
        }
    }

    /// Short type description used in error messages
    pub fn type_name(&self) -> String {
        self.column_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "missing".to_string())
    }

    /// Length of a vector cell, `None` for scalar and missing cells
    pub fn vector_len(&self) -> Option<usize> {
        match self {
            Cell::BitVector(v) => Some(v.len()),
            Cell::ByteVector(v) => Some(v.len()),
            Cell::DoubleVector(v) => Some(v.len()),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Numeric(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Nominal(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Nominal(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Missing)
    }
}

/// Tabular data source
///
/// Row and column indices are zero based. Implementations must return a cell for every
/// `(row, column)` pair with `row < nrows()` and `column < ncols()`.
pub trait Table {
    fn nrows(&self) -> usize;

    fn columns(&self) -> &[ColumnSpec];

    fn row_key(&self, row: usize) -> &str;

    fn cell(&self, row: usize, column: usize) -> &Cell;

    fn ncols(&self) -> usize {
        self.columns().len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name() == name)
    }
}

impl<T: Table + ?Sized> Table for &T {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn columns(&self) -> &[ColumnSpec] {
        (**self).columns()
    }

    fn row_key(&self, row: usize) -> &str {
        (**self).row_key(row)
    }

    fn cell(&self, row: usize, column: usize) -> &Cell {
        (**self).cell(row, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_types() {
        assert_eq!(Cell::from(1.5f64).column_type(), Some(ColumnType::Numeric));
        assert_eq!(Cell::from("a").column_type(), Some(ColumnType::Nominal));
        assert_eq!(Cell::from(None::<f64>), Cell::Missing);
        assert_eq!(Cell::Missing.type_name(), "missing");
        assert_eq!(Cell::BitVector(vec![true, false]).vector_len(), Some(2));
        assert!(ColumnType::ByteVector.is_vector());
        assert!(!ColumnType::Nominal.is_vector());
    }

    #[test]
    fn column_spec_possible_values() {
        let spec = ColumnSpec::nominal("color").with_possible_values(vec!["red", "green"]);
        assert_eq!(spec.name(), "color");
        assert_eq!(spec.column_type(), ColumnType::Nominal);
        assert_eq!(
            spec.possible_values(),
            Some(&["red".to_string(), "green".to_string()][..])
        );
    }
}
