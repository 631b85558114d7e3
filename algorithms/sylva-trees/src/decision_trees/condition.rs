//! Human readable split conditions
//!
//! A split produces one [`Condition`] per child. The condition of a child holds for exactly the
//! values that are routed to it, including whether it receives missing values.
use std::fmt;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use sylva::bitset::BitSet;

use super::schema::{Schema, Value};
use super::split::{Direction, Split, SplitKind};

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    LessThanOrEqual,
    Greater,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Numeric {
        attribute: String,
        operator: Operator,
        threshold: f64,
        accepts_missing: bool,
    },
    /// Holds for the listed categories, fails for the categories of the sibling
    Nominal {
        attribute: String,
        values: Vec<String>,
        codes: BitSet,
        rejected: BitSet,
        accepts_missing: bool,
    },
    /// Holds if the bit equals `set`
    Bit {
        attribute: String,
        set: bool,
        accepts_missing: bool,
    },
}

impl Condition {
    /// Conditions of the left and right child of a split
    pub fn of_split(split: &Split, schema: &Schema) -> (Condition, Condition) {
        let meta = schema.attribute(split.attribute());
        let attribute = meta.name().to_string();
        let missing_left = split.missing_direction() == Direction::Left;

        match split.kind() {
            SplitKind::Numeric { threshold } => (
                Condition::Numeric {
                    attribute: attribute.clone(),
                    operator: Operator::LessThanOrEqual,
                    threshold: *threshold,
                    accepts_missing: missing_left,
                },
                Condition::Numeric {
                    attribute,
                    operator: Operator::Greater,
                    threshold: *threshold,
                    accepts_missing: !missing_left,
                },
            ),
            SplitKind::Nominal { left, right } => {
                let categories = meta.categories();
                let names = |set: &BitSet| {
                    set.ones()
                        .filter_map(|c| categories.get(c).cloned())
                        .collect::<Vec<_>>()
                };
                (
                    Condition::Nominal {
                        attribute: attribute.clone(),
                        values: names(left),
                        codes: left.clone(),
                        rejected: right.clone(),
                        accepts_missing: missing_left,
                    },
                    Condition::Nominal {
                        attribute,
                        values: names(right),
                        codes: right.clone(),
                        rejected: left.clone(),
                        accepts_missing: !missing_left,
                    },
                )
            }
            SplitKind::BitPresence => (
                Condition::Bit {
                    attribute: attribute.clone(),
                    set: false,
                    accepts_missing: missing_left,
                },
                Condition::Bit {
                    attribute,
                    set: true,
                    accepts_missing: !missing_left,
                },
            ),
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Condition::Numeric { attribute, .. }
            | Condition::Nominal { attribute, .. }
            | Condition::Bit { attribute, .. } => attribute,
        }
    }

    pub fn accepts_missing(&self) -> bool {
        match self {
            Condition::Numeric {
                accepts_missing, ..
            }
            | Condition::Nominal {
                accepts_missing, ..
            }
            | Condition::Bit {
                accepts_missing, ..
            } => *accepts_missing,
        }
    }

    /// True if a row with value `value` satisfies the condition
    ///
    /// Values of the wrong kind and categories outside the node's partition count as missing.
    pub fn evaluate(&self, value: Value) -> bool {
        let verdict = match (self, value) {
            (
                Condition::Numeric {
                    operator,
                    threshold,
                    ..
                },
                Value::Number(v),
            ) => Some(match operator {
                Operator::LessThanOrEqual => v <= *threshold,
                Operator::Greater => v > *threshold,
            }),
            (
                Condition::Nominal {
                    codes, rejected, ..
                },
                Value::Category(c),
            ) => {
                if codes.contains(c as usize) {
                    Some(true)
                } else if rejected.contains(c as usize) {
                    Some(false)
                } else {
                    None
                }
            }
            (Condition::Bit { set, .. }, Value::Bit(b)) => Some(b == *set),
            _ => None,
        };

        verdict.unwrap_or_else(|| self.accepts_missing())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Numeric {
                attribute,
                operator,
                threshold,
                ..
            } => {
                let op = match operator {
                    Operator::LessThanOrEqual => "<=",
                    Operator::Greater => ">",
                };
                write!(f, "{} {} {}", attribute, op, threshold)?;
            }
            Condition::Nominal {
                attribute, values, ..
            } => write!(f, "{} in {{{}}}", attribute, values.join(", "))?,
            Condition::Bit { attribute, set, .. } => {
                write!(f, "{} = {}", attribute, if *set { 1 } else { 0 })?
            }
        }
        if self.accepts_missing() {
            write!(f, " or missing")?;
        }
        Ok(())
    }
}
