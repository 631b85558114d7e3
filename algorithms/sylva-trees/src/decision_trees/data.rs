//! Columnar training store
//!
//! A [`TreeData`] holds one column object per training attribute and a target column, built once
//! from a [`Table`] and read-only afterwards. Numeric columns keep their non-missing values
//! presorted, nominal and bit columns keep a row bitset per value, and every column keeps the
//! list of rows where it is missing.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use sylva::bitset::BitSet;
use sylva::dataset::{Cell, ColumnSpec, ColumnType, Table};
use sylva::error::{Error, Result};
use sylva::warning::Warning;

use super::schema::{
    AttributeKind, AttributeMeta, AttributeValues, Schema, TargetKind, TargetMeta, Value,
};

/// Nominal columns with more distinct values are excluded from training
pub const DEFAULT_MAX_NOMINAL_VALUES: usize = 1000;

/// Values of a numeric attribute
#[derive(Debug, Clone)]
pub struct NumericColumn {
    values: Vec<Option<f64>>,
    sorted: Vec<(f64, usize)>,
    missing: Vec<usize>,
}

impl NumericColumn {
    fn new(values: Vec<Option<f64>>) -> Self {
        let mut sorted: Vec<(f64, usize)> = values
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.map(|v| (v, row)))
            .collect();
        // stable, so equal values keep their row order
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let missing = missing_rows(&values);

        NumericColumn {
            values,
            sorted,
            missing,
        }
    }

    pub fn value(&self, row: usize) -> Option<f64> {
        self.values[row]
    }

    /// Non-missing `(value, row)` pairs in ascending value order, ties in row order
    pub fn sorted(&self) -> &[(f64, usize)] {
        &self.sorted
    }

    pub fn missing(&self) -> &[usize] {
        &self.missing
    }
}

/// Category codes of a nominal attribute
#[derive(Debug, Clone)]
pub struct NominalColumn {
    codes: Vec<Option<u32>>,
    value_rows: Vec<BitSet>,
    missing: Vec<usize>,
}

impl NominalColumn {
    fn new(codes: Vec<Option<u32>>, n_values: usize) -> Self {
        let mut value_rows = vec![BitSet::new(codes.len()); n_values];
        for (row, code) in codes.iter().enumerate() {
            if let Some(code) = code {
                value_rows[*code as usize].insert(row);
            }
        }
        let missing = missing_rows(&codes);

        NominalColumn {
            codes,
            value_rows,
            missing,
        }
    }

    pub fn code(&self, row: usize) -> Option<u32> {
        self.codes[row]
    }

    pub fn n_values(&self) -> usize {
        self.value_rows.len()
    }

    /// Rows holding the category `code`
    pub fn rows_with(&self, code: u32) -> &BitSet {
        &self.value_rows[code as usize]
    }

    pub fn missing(&self) -> &[usize] {
        &self.missing
    }
}

/// Presence flags of a bit vector position
#[derive(Debug, Clone)]
pub struct BitColumn {
    values: Vec<Option<bool>>,
    set: BitSet,
    missing: Vec<usize>,
}

impl BitColumn {
    fn new(values: Vec<Option<bool>>) -> Self {
        let set = BitSet::from_indices(
            values.len(),
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| **v == Some(true))
                .map(|(row, _)| row),
        );
        let missing = missing_rows(&values);

        BitColumn {
            values,
            set,
            missing,
        }
    }

    pub fn value(&self, row: usize) -> Option<bool> {
        self.values[row]
    }

    /// Rows with the bit set
    pub fn set_rows(&self) -> &BitSet {
        &self.set
    }

    pub fn missing(&self) -> &[usize] {
        &self.missing
    }
}

fn missing_rows<T>(values: &[Option<T>]) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_none())
        .map(|(row, _)| row)
        .collect()
}

#[derive(Debug, Clone)]
pub enum AttributeColumn {
    Numeric(NumericColumn),
    Nominal(NominalColumn),
    Bit(BitColumn),
}

impl AttributeColumn {
    pub fn value(&self, row: usize) -> Value {
        let value = match self {
            AttributeColumn::Numeric(c) => c.value(row).map(Value::Number),
            AttributeColumn::Nominal(c) => c.code(row).map(Value::Category),
            AttributeColumn::Bit(c) => c.value(row).map(Value::Bit),
        };
        value.unwrap_or(Value::Missing)
    }

    pub fn missing(&self) -> &[usize] {
        match self {
            AttributeColumn::Numeric(c) => c.missing(),
            AttributeColumn::Nominal(c) => c.missing(),
            AttributeColumn::Bit(c) => c.missing(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TargetColumn {
    /// Class ids, positions in the schema's class list
    Classes { codes: Vec<u32>, n_classes: usize },
    Numeric { values: Vec<f64> },
}

impl TargetColumn {
    pub fn len(&self) -> usize {
        match self {
            TargetColumn::Classes { codes, .. } => codes.len(),
            TargetColumn::Numeric { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Class ids, `None` for a numeric target
    pub fn class_codes(&self) -> Option<&[u32]> {
        match self {
            TargetColumn::Classes { codes, .. } => Some(codes),
            TargetColumn::Numeric { .. } => None,
        }
    }
}

/// Columnar view on a training table
#[derive(Debug, Clone)]
pub struct TreeData {
    schema: Arc<Schema>,
    columns: Vec<AttributeColumn>,
    target: TargetColumn,
    row_keys: Vec<String>,
    warnings: Vec<Warning>,
}

impl TreeData {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn nrows(&self) -> usize {
        self.row_keys.len()
    }

    pub fn n_attributes(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, attribute: usize) -> &AttributeColumn {
        &self.columns[attribute]
    }

    pub fn target(&self) -> &TargetColumn {
        &self.target
    }

    pub fn row_key(&self, row: usize) -> &str {
        &self.row_keys[row]
    }

    /// Columns excluded during ingestion
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn value(&self, attribute: usize, row: usize) -> Value {
        self.columns[attribute].value(row)
    }

    /// A training row that can be routed through a tree
    pub fn row(&self, row: usize) -> TrainingRow<'_> {
        TrainingRow { data: self, row }
    }
}

/// A row of the training store
#[derive(Debug, Clone, Copy)]
pub struct TrainingRow<'a> {
    data: &'a TreeData,
    row: usize,
}

impl<'a> AttributeValues for TrainingRow<'a> {
    fn value(&self, attribute: usize) -> Value {
        self.data.value(attribute, self.row)
    }
}

/// Builds a [`TreeData`] from a table
///
/// ### Example
///
/// ```rust
/// use sylva::dataset::{Cell, ColumnSpec, DataTable};
/// use sylva_trees::TreeDataBuilder;
///
/// let table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")])
///     .with_row("r0", vec![Cell::Numeric(1.0), "a".into()]).unwrap()
///     .with_row("r1", vec![Cell::Numeric(2.0), "b".into()]).unwrap();
///
/// let data = TreeDataBuilder::new("class").build(&table).unwrap();
/// assert_eq!(data.nrows(), 2);
/// assert_eq!(data.schema().classes(), &["a".to_string(), "b".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct TreeDataBuilder {
    target: String,
    attributes: Option<Vec<String>>,
    max_nominal_values: usize,
}

impl TreeDataBuilder {
    pub fn new(target: impl Into<String>) -> Self {
        TreeDataBuilder {
            target: target.into(),
            attributes: None,
            max_nominal_values: DEFAULT_MAX_NOMINAL_VALUES,
        }
    }

    /// Restricts training to the named columns, by default every column except the target is used
    pub fn attributes<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Nominal columns with more distinct values are excluded with a warning
    pub fn max_nominal_values(mut self, max_nominal_values: usize) -> Self {
        self.max_nominal_values = max_nominal_values;
        self
    }

    pub fn build<T: Table>(&self, table: &T) -> Result<TreeData> {
        if table.nrows() == 0 {
            return Err(Error::EmptyTable);
        }

        let target_idx = table
            .column_index(&self.target)
            .ok_or_else(|| Error::TargetNotFound(self.target.clone()))?;
        let (target_meta, target) = read_target(table, target_idx)?;

        let attribute_columns: Vec<usize> = match &self.attributes {
            None => (0..table.ncols()).filter(|&c| c != target_idx).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    table.column_index(name).ok_or_else(|| {
                        Error::Parameters(format!("attribute column `{}` not found", name))
                    })
                })
                .filter(|idx| idx.as_ref().map(|&c| c != target_idx).unwrap_or(true))
                .collect::<Result<Vec<_>>>()?,
        };

        let mut metas = Vec::new();
        let mut columns = Vec::new();
        let mut warnings = Vec::new();

        for column in attribute_columns {
            let spec = &table.columns()[column];
            match spec.column_type() {
                ColumnType::Numeric => {
                    let values = read_numeric(table, column, spec)?;
                    metas.push(AttributeMeta::scalar(
                        spec.name(),
                        ColumnType::Numeric,
                        AttributeKind::Numeric,
                    ));
                    columns.push(AttributeColumn::Numeric(NumericColumn::new(values)));
                }
                ColumnType::Nominal => {
                    let (codes, domain) = read_nominal(table, column, spec)?;
                    if codes.iter().all(Option::is_none) {
                        warnings.push(Warning::EmptyColumnDomain {
                            column: spec.name().to_string(),
                        });
                    } else if domain.len() > self.max_nominal_values {
                        warnings.push(Warning::TooManyNominalValues {
                            column: spec.name().to_string(),
                            count: domain.len(),
                            limit: self.max_nominal_values,
                        });
                    } else {
                        let n_values = domain.len();
                        metas.push(AttributeMeta::scalar(
                            spec.name(),
                            ColumnType::Nominal,
                            AttributeKind::Nominal { values: domain },
                        ));
                        columns.push(AttributeColumn::Nominal(NominalColumn::new(
                            codes, n_values,
                        )));
                    }
                }
                column_type => {
                    let width = vector_width(table, column, spec)?;
                    if width == 0 {
                        warnings.push(Warning::EmptyColumnDomain {
                            column: spec.name().to_string(),
                        });
                    }
                    for position in 0..width {
                        metas.push(AttributeMeta::vector_position(
                            spec.name(),
                            column_type,
                            position,
                        ));
                        columns.push(read_vector_position(table, column, spec, position)?);
                    }
                }
            }
        }

        for warning in &warnings {
            warn!(%warning, "column excluded from training");
        }

        if columns.is_empty() {
            return Err(Error::NoAttributes);
        }

        debug!(
            nrows = table.nrows(),
            n_attributes = columns.len(),
            "training data ingested"
        );

        Ok(TreeData {
            schema: Arc::new(Schema::new(metas, target_meta)),
            columns,
            target,
            row_keys: (0..table.nrows())
                .map(|row| table.row_key(row).to_string())
                .collect(),
            warnings,
        })
    }
}

fn mismatch<T: Table>(table: &T, row: usize, spec: &ColumnSpec, cell: &Cell) -> Error {
    Error::SchemaMismatch {
        row: table.row_key(row).to_string(),
        column: spec.name().to_string(),
        declared: spec.column_type(),
        found: cell.type_name(),
    }
}

fn non_finite<T: Table>(table: &T, row: usize, spec: &ColumnSpec) -> Error {
    Error::NonFiniteValue {
        row: table.row_key(row).to_string(),
        column: spec.name().to_string(),
    }
}

fn read_target<T: Table>(table: &T, column: usize) -> Result<(TargetMeta, TargetColumn)> {
    let spec = &table.columns()[column];
    let missing = |row: usize| Error::MissingTargetValue {
        row: table.row_key(row).to_string(),
    };

    match spec.column_type() {
        ColumnType::Nominal => {
            let (codes, classes) = read_nominal(table, column, spec)?;
            let codes = codes
                .into_iter()
                .enumerate()
                .map(|(row, code)| code.ok_or_else(|| missing(row)))
                .collect::<Result<Vec<_>>>()?;
            let target = TargetColumn::Classes {
                codes,
                n_classes: classes.len(),
            };
            Ok((
                TargetMeta::new(spec.name(), TargetKind::Classification { classes }),
                target,
            ))
        }
        ColumnType::Numeric => {
            let values = read_numeric(table, column, spec)?
                .into_iter()
                .enumerate()
                .map(|(row, value)| value.ok_or_else(|| missing(row)))
                .collect::<Result<Vec<_>>>()?;
            Ok((
                TargetMeta::new(spec.name(), TargetKind::Regression),
                TargetColumn::Numeric { values },
            ))
        }
        found => Err(Error::InvalidTargetType {
            column: spec.name().to_string(),
            found,
        }),
    }
}

fn read_numeric<T: Table>(table: &T, column: usize, spec: &ColumnSpec) -> Result<Vec<Option<f64>>> {
    (0..table.nrows())
        .map(|row| match table.cell(row, column) {
            Cell::Missing => Ok(None),
            Cell::Numeric(v) if v.is_finite() => Ok(Some(*v)),
            Cell::Numeric(_) => Err(non_finite(table, row, spec)),
            cell => Err(mismatch(table, row, spec, cell)),
        })
        .collect()
}

/// Category codes and the ordered domain of a nominal column
///
/// Declared possible values fix the domain, otherwise it is built in order of first appearance.
fn read_nominal<T: Table>(
    table: &T,
    column: usize,
    spec: &ColumnSpec,
) -> Result<(Vec<Option<u32>>, Vec<String>)> {
    let declared = spec.possible_values().is_some();
    let mut domain: Vec<String> = spec.possible_values().map(<[_]>::to_vec).unwrap_or_default();
    let mut lookup: HashMap<String, u32> = domain
        .iter()
        .enumerate()
        .map(|(code, v)| (v.clone(), code as u32))
        .collect();

    let mut codes = Vec::with_capacity(table.nrows());
    for row in 0..table.nrows() {
        let code = match table.cell(row, column) {
            Cell::Missing => None,
            Cell::Nominal(value) => match lookup.get(value) {
                Some(&code) => Some(code),
                None if declared => {
                    return Err(Error::SchemaMismatch {
                        row: table.row_key(row).to_string(),
                        column: spec.name().to_string(),
                        declared: spec.column_type(),
                        found: format!("undeclared value `{}`", value),
                    })
                }
                None => {
                    let code = domain.len() as u32;
                    domain.push(value.clone());
                    lookup.insert(value.clone(), code);
                    Some(code)
                }
            },
            cell => return Err(mismatch(table, row, spec, cell)),
        };
        codes.push(code);
    }

    Ok((codes, domain))
}

/// Width of a vector column, 0 if every cell is missing
fn vector_width<T: Table>(table: &T, column: usize, spec: &ColumnSpec) -> Result<usize> {
    let mut width = None;
    for row in 0..table.nrows() {
        let cell = table.cell(row, column);
        if cell.is_missing() {
            continue;
        }
        if cell.column_type() != Some(spec.column_type()) {
            return Err(mismatch(table, row, spec, cell));
        }
        let len = cell.vector_len().unwrap_or(0);
        match width {
            None => width = Some(len),
            Some(expected) if expected != len => {
                return Err(Error::VectorLengthMismatch {
                    row: table.row_key(row).to_string(),
                    column: spec.name().to_string(),
                    expected,
                    found: len,
                })
            }
            _ => {}
        }
    }

    Ok(width.unwrap_or(0))
}

fn read_vector_position<T: Table>(
    table: &T,
    column: usize,
    spec: &ColumnSpec,
    position: usize,
) -> Result<AttributeColumn> {
    let rows = 0..table.nrows();
    let column = match spec.column_type() {
        ColumnType::BitVector => AttributeColumn::Bit(BitColumn::new(
            rows.map(|row| match table.cell(row, column) {
                Cell::BitVector(v) => Some(v[position]),
                _ => None,
            })
            .collect(),
        )),
        ColumnType::ByteVector => AttributeColumn::Numeric(NumericColumn::new(
            rows.map(|row| match table.cell(row, column) {
                Cell::ByteVector(v) => Some(v[position] as f64),
                _ => None,
            })
            .collect(),
        )),
        _ => {
            let values = rows
                .map(|row| match table.cell(row, column) {
                    Cell::DoubleVector(v) if v[position].is_finite() => Ok(Some(v[position])),
                    Cell::DoubleVector(_) => Err(non_finite(table, row, spec)),
                    _ => Ok(None),
                })
                .collect::<Result<Vec<_>>>()?;
            AttributeColumn::Numeric(NumericColumn::new(values))
        }
    };

    Ok(column)
}
