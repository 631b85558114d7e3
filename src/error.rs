//! Error types in Sylva
//!

use thiserror::Error;

use ndarray::ShapeError;

use crate::dataset::ColumnType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid parameter {0}")]
    Parameters(String),
    #[error("target column `{0}` not found")]
    TargetNotFound(String),
    #[error("target column `{column}` has type {found}, expected a nominal or numeric column")]
    InvalidTargetType { column: String, found: ColumnType },
    #[error("row {row}: expected {expected} cells, found {found}")]
    CellCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("duplicate row key `{0}`")]
    DuplicateRowKey(String),
    #[error("row `{row}`, column `{column}`: declared {declared}, found {found}")]
    SchemaMismatch {
        row: String,
        column: String,
        declared: ColumnType,
        found: String,
    },
    #[error("row `{row}`, column `{column}`: non-finite numeric value")]
    NonFiniteValue { row: String, column: String },
    #[error("row `{row}`, column `{column}`: vector of length {found}, expected {expected}")]
    VectorLengthMismatch {
        row: String,
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("row `{row}`: missing target value")]
    MissingTargetValue { row: String },
    #[error("column `{0}` has no non-missing values")]
    EmptyColumnDomain(String),
    #[error("no usable attribute columns")]
    NoAttributes,
    #[error("table has no rows")]
    EmptyTable,
    #[error("model does not store row samples, out-of-bag evaluation is unavailable")]
    NoRowSamples,
    #[error("expected {expected} rows, found {found}")]
    RowCountMismatch { expected: usize, found: usize },
    #[error("training was cancelled")]
    Cancelled,
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ShapeError),
}
