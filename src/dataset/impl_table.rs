use std::collections::HashSet;

use ndarray::{ArrayBase, Data, Ix2};

use super::{Cell, ColumnSpec, Table};
use crate::error::{Error, Result};

/// In-memory, row-major table
///
/// Row keys are unique. Rows are checked for the right number of cells when they are pushed,
/// cell types are only checked when a learner ingests the table.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    columns: Vec<ColumnSpec>,
    keys: Vec<String>,
    rows: Vec<Vec<Cell>>,
    seen_keys: HashSet<String>,
}

impl DataTable {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        DataTable {
            columns,
            ..Default::default()
        }
    }

    /// Creates a table of numeric columns from a matrix with dimensionality (nrows, ncols)
    ///
    /// Rows are keyed `Row0`, `Row1`, ...
    pub fn from_array<D: Data<Elem = f64>>(
        records: &ArrayBase<D, Ix2>,
        names: &[&str],
    ) -> Result<Self> {
        if names.len() != records.ncols() {
            return Err(Error::Parameters(format!(
                "{} column names given for a matrix with {} columns",
                names.len(),
                records.ncols()
            )));
        }

        let mut table = DataTable::new(names.iter().map(|n| ColumnSpec::numeric(*n)).collect());
        for (i, row) in records.rows().into_iter().enumerate() {
            table.push_row(
                format!("Row{}", i),
                row.iter().map(|v| Cell::Numeric(*v)).collect(),
            )?;
        }

        Ok(table)
    }

    /// Appends a row
    ///
    /// Fails with `CellCountMismatch` if the number of cells differs from the number of columns,
    /// and with `DuplicateRowKey` if the key is already taken.
    pub fn push_row(&mut self, key: impl Into<String>, cells: Vec<Cell>) -> Result<()> {
        let key = key.into();
        if cells.len() != self.columns.len() {
            return Err(Error::CellCountMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        if !self.seen_keys.insert(key.clone()) {
            return Err(Error::DuplicateRowKey(key));
        }

        self.keys.push(key);
        self.rows.push(cells);

        Ok(())
    }

    /// Builder variant of [`push_row`](DataTable::push_row)
    pub fn with_row(mut self, key: impl Into<String>, cells: Vec<Cell>) -> Result<Self> {
        self.push_row(key, cells)?;
        Ok(self)
    }

    /// Cells of a row
    pub fn row(&self, row: usize) -> &[Cell] {
        &self.rows[row]
    }
}

impl Table for DataTable {
    fn nrows(&self) -> usize {
        self.rows.len()
    }

    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn row_key(&self, row: usize) -> &str {
        &self.keys[row]
    }

    fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.rows[row][column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnType;
    use ndarray::array;

    #[test]
    fn push_rows_and_read_back() -> Result<()> {
        let table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("y")])
            .with_row("a", vec![Cell::Numeric(1.0), "red".into()])?
            .with_row("b", vec![Cell::Missing, "blue".into()])?;

        assert_eq!(table.nrows(), 2);
        assert_eq!(table.ncols(), 2);
        assert_eq!(table.row_key(1), "b");
        assert_eq!(table.cell(0, 1), &Cell::Nominal("red".into()));
        assert!(table.cell(1, 0).is_missing());
        assert_eq!(table.column_index("y"), Some(1));
        assert_eq!(table.column_index("z"), None);

        Ok(())
    }

    #[test]
    fn rejects_wrong_cell_count() {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x")]);
        let err = table
            .push_row("a", vec![Cell::Numeric(1.0), Cell::Numeric(2.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CellCountMismatch {
                row: 0,
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x")]);
        table.push_row("a", vec![Cell::Numeric(1.0)]).unwrap();
        let err = table.push_row("a", vec![Cell::Numeric(2.0)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateRowKey(k) if k == "a"));
    }

    #[test]
    fn from_array_creates_numeric_columns() -> Result<()> {
        let table = DataTable::from_array(&array![[1., 2.], [3., 4.], [5., 6.]], &["a", "b"])?;
        assert_eq!(table.nrows(), 3);
        assert_eq!(table.columns()[1].column_type(), ColumnType::Numeric);
        assert_eq!(table.row_key(2), "Row2");
        assert_eq!(table.cell(2, 1), &Cell::Numeric(6.0));

        assert!(DataTable::from_array(&array![[1., 2.]], &["a"]).is_err());
        Ok(())
    }

    #[test]
    fn from_random_array() -> Result<()> {
        use ndarray::Array2;
        use ndarray_rand::rand_distr::Uniform;
        use ndarray_rand::RandomExt;

        let records = Array2::random((20, 3), Uniform::new(-1., 1.));
        let table = DataTable::from_array(&records, &["a", "b", "c"])?;

        for (row, values) in records.rows().into_iter().enumerate() {
            for (column, v) in values.iter().enumerate() {
                assert_eq!(table.cell(row, column), &Cell::Numeric(*v));
            }
        }
        Ok(())
    }
}
