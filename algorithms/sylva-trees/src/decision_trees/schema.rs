//! Attribute and target metadata shared by a training store and every tree grown on it
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use sylva::dataset::{Cell, ColumnType, Table};
use sylva::error::{Error, Result};

/// Kind of a training attribute
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// Ordered values, from a numeric column or a byte/double vector position
    Numeric,
    /// Categories with a fixed order, the category code is the position in `values`
    Nominal { values: Vec<String> },
    /// Presence of a bit vector position
    Bit,
}

/// A single training attribute
///
/// Scalar columns map to exactly one attribute. Vector columns map to one attribute per position,
/// named `column[position]`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMeta {
    name: String,
    column: String,
    column_type: ColumnType,
    position: Option<usize>,
    kind: AttributeKind,
}

impl AttributeMeta {
    pub(crate) fn scalar(column: &str, column_type: ColumnType, kind: AttributeKind) -> Self {
        AttributeMeta {
            name: column.to_string(),
            column: column.to_string(),
            column_type,
            position: None,
            kind,
        }
    }

    pub(crate) fn vector_position(column: &str, column_type: ColumnType, position: usize) -> Self {
        let kind = match column_type {
            ColumnType::BitVector => AttributeKind::Bit,
            _ => AttributeKind::Numeric,
        };
        AttributeMeta {
            name: format!("{}[{}]", column, position),
            column: column.to_string(),
            column_type,
            position: Some(position),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the table column holding the attribute
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Position inside a vector column, `None` for scalar columns
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Category values of a nominal attribute, empty for other kinds
    pub fn categories(&self) -> &[String] {
        match &self.kind {
            AttributeKind::Nominal { values } => values,
            _ => &[],
        }
    }

    /// Converts a cell of the attribute's column
    ///
    /// Unknown categories, non-finite numbers and out of range vector positions become
    /// [`Value::Missing`]. `lookup` maps category names to codes for nominal attributes.
    fn convert(&self, cell: &Cell, lookup: Option<&HashMap<String, u32>>) -> Option<Value> {
        let value = match (cell, &self.kind, self.position) {
            (Cell::Missing, _, _) => Value::Missing,
            (Cell::Numeric(v), AttributeKind::Numeric, None) => Value::number(*v),
            (Cell::Nominal(s), AttributeKind::Nominal { values }, None) => {
                let code = match lookup {
                    Some(lookup) => lookup.get(s).copied(),
                    None => values.iter().position(|v| v == s).map(|c| c as u32),
                };
                code.map(Value::Category).unwrap_or(Value::Missing)
            }
            (Cell::ByteVector(v), AttributeKind::Numeric, Some(p)) => v
                .get(p)
                .map(|b| Value::Number(*b as f64))
                .unwrap_or(Value::Missing),
            (Cell::DoubleVector(v), AttributeKind::Numeric, Some(p)) => v
                .get(p)
                .map(|d| Value::number(*d))
                .unwrap_or(Value::Missing),
            (Cell::BitVector(v), AttributeKind::Bit, Some(p)) => {
                v.get(p).map(|b| Value::Bit(*b)).unwrap_or(Value::Missing)
            }
            _ => return None,
        };
        Some(value)
    }

    fn mismatch(&self, row: &str, cell: &Cell) -> Error {
        Error::SchemaMismatch {
            row: row.to_string(),
            column: self.column.clone(),
            declared: self.column_type,
            found: cell.type_name(),
        }
    }
}

/// What the trees predict
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    /// Nominal target, the class id is the position in `classes`
    Classification { classes: Vec<String> },
    /// Numeric target
    Regression,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMeta {
    name: String,
    kind: TargetKind,
}

impl TargetMeta {
    pub(crate) fn new(name: &str, kind: TargetKind) -> Self {
        TargetMeta {
            name: name.to_string(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }
}

/// Attribute and target metadata
///
/// Fixed when the training store is built and shared (behind an `Arc`) by every tree grown from
/// it. Attribute ids used by splits are positions in [`Schema::attributes`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    attributes: Vec<AttributeMeta>,
    target: TargetMeta,
}

impl Schema {
    pub(crate) fn new(attributes: Vec<AttributeMeta>, target: TargetMeta) -> Self {
        Schema { attributes, target }
    }

    pub fn attributes(&self) -> &[AttributeMeta] {
        &self.attributes
    }

    pub fn attribute(&self, attribute: usize) -> &AttributeMeta {
        &self.attributes[attribute]
    }

    pub fn n_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name() == name)
    }

    pub fn target(&self) -> &TargetMeta {
        &self.target
    }

    pub fn is_classification(&self) -> bool {
        matches!(self.target.kind, TargetKind::Classification { .. })
    }

    /// Class values in class id order, empty for regression
    pub fn classes(&self) -> &[String] {
        match &self.target.kind {
            TargetKind::Classification { classes } => classes,
            TargetKind::Regression => &[],
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes().len()
    }

    /// Builds a predictor record from cells addressed by column name
    ///
    /// Columns without a cell are missing. A cell of the wrong type for its column fails with
    /// `SchemaMismatch`, reported for the row key `row`.
    pub fn record<'a, I>(&self, row: &str, cells: I) -> Result<PredictorRecord>
    where
        I: IntoIterator<Item = (&'a str, &'a Cell)>,
    {
        let cells: HashMap<&str, &Cell> = cells.into_iter().collect();

        let values = self
            .attributes
            .iter()
            .map(|meta| match cells.get(meta.column()) {
                None => Ok(Value::Missing),
                Some(cell) => meta.convert(cell, None).ok_or_else(|| meta.mismatch(row, cell)),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PredictorRecord::from_values(values))
    }

    /// Resolves the attributes of this schema against the columns of a table
    pub fn bind<T: Table>(&self, table: &T) -> TableBinding {
        let columns = self
            .attributes
            .iter()
            .map(|meta| table.column_index(meta.column()))
            .collect();
        let lookups = self
            .attributes
            .iter()
            .map(|meta| match meta.kind() {
                AttributeKind::Nominal { values } => Some(
                    values
                        .iter()
                        .enumerate()
                        .map(|(code, v)| (v.clone(), code as u32))
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        TableBinding { columns, lookups }
    }
}

/// A single attribute value as seen by a split
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Category(u32),
    Bit(bool),
}

impl Value {
    /// A number, or `Missing` for non-finite values
    pub fn number(v: f64) -> Self {
        if v.is_finite() {
            Value::Number(v)
        } else {
            Value::Missing
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// Anything that can be routed through a tree
pub trait AttributeValues {
    /// Value of the attribute with id `attribute`
    fn value(&self, attribute: usize) -> Value;
}

/// One row's attribute values in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorRecord {
    values: Vec<Value>,
}

impl PredictorRecord {
    pub fn from_values(values: Vec<Value>) -> Self {
        PredictorRecord { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl AttributeValues for PredictorRecord {
    fn value(&self, attribute: usize) -> Value {
        self.values
            .get(attribute)
            .copied()
            .unwrap_or(Value::Missing)
    }
}

/// Schema attributes resolved against the columns of a prediction table
///
/// Attributes whose column is absent from the table are treated as missing.
#[derive(Debug, Clone)]
pub struct TableBinding {
    columns: Vec<Option<usize>>,
    lookups: Vec<Option<HashMap<String, u32>>>,
}

impl TableBinding {
    /// Number of attributes found in the table
    pub fn n_bound(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    /// Reads the predictor record of a table row
    pub fn record<T: Table>(&self, schema: &Schema, table: &T, row: usize) -> Result<PredictorRecord> {
        let values = schema
            .attributes()
            .iter()
            .zip(self.columns.iter().zip(self.lookups.iter()))
            .map(|(meta, (column, lookup))| match column {
                None => Ok(Value::Missing),
                Some(column) => {
                    let cell = table.cell(row, *column);
                    meta.convert(cell, lookup.as_ref())
                        .ok_or_else(|| meta.mismatch(table.row_key(row), cell))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PredictorRecord::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva::dataset::{ColumnSpec, DataTable};

    fn schema() -> Schema {
        Schema::new(
            vec![
                AttributeMeta::scalar("x", ColumnType::Numeric, AttributeKind::Numeric),
                AttributeMeta::scalar(
                    "color",
                    ColumnType::Nominal,
                    AttributeKind::Nominal {
                        values: vec!["red".into(), "green".into()],
                    },
                ),
                AttributeMeta::vector_position("fp", ColumnType::BitVector, 0),
                AttributeMeta::vector_position("fp", ColumnType::BitVector, 1),
            ],
            TargetMeta::new(
                "class",
                TargetKind::Classification {
                    classes: vec!["a".into(), "b".into()],
                },
            ),
        )
    }

    #[test]
    fn vector_positions_are_named_attributes() {
        let schema = schema();
        assert_eq!(schema.attribute(3).name(), "fp[1]");
        assert_eq!(schema.attribute(3).column(), "fp");
        assert_eq!(schema.attribute(3).kind(), &AttributeKind::Bit);
        assert_eq!(schema.attribute_index("color"), Some(1));
        assert_eq!(schema.n_classes(), 2);
    }

    #[test]
    fn record_from_named_cells() -> Result<()> {
        let schema = schema();
        let x = Cell::Numeric(2.0);
        let color = Cell::from("blue");
        let fp = Cell::BitVector(vec![true, false]);
        let record = schema.record("r", vec![("x", &x), ("color", &color), ("fp", &fp)])?;

        assert_eq!(
            record.values(),
            &[
                Value::Number(2.0),
                Value::Missing,
                Value::Bit(true),
                Value::Bit(false)
            ]
        );

        let absent = schema.record("r", vec![("color", &Cell::from("green"))])?;
        assert_eq!(absent.value(0), Value::Missing);
        assert_eq!(absent.value(1), Value::Category(1));
        Ok(())
    }

    #[test]
    fn wrong_cell_type_is_rejected() {
        let schema = schema();
        let x = Cell::from("two");
        assert!(matches!(
            schema.record("r", vec![("x", &x)]),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn binding_reads_table_rows() -> Result<()> {
        let schema = schema();
        let table = DataTable::new(vec![ColumnSpec::nominal("color"), ColumnSpec::numeric("x")])
            .with_row("r0", vec!["green".into(), Cell::Numeric(f64::NAN)])?;

        let binding = schema.bind(&table);
        assert_eq!(binding.n_bound(), 2);

        let record = binding.record(&schema, &table, 0)?;
        assert_eq!(record.value(0), Value::Missing);
        assert_eq!(record.value(1), Value::Category(1));
        assert_eq!(record.value(2), Value::Missing);
        Ok(())
    }
}
