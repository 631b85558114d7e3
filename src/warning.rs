//! Degraded-output conditions
//!
//! Warnings never abort a run. They are collected on the object that experienced them (the
//! training data, the fitted model or an out-of-bag estimate) and logged when raised.

use std::fmt;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A nominal attribute without a single non-missing value, excluded from training
    EmptyColumnDomain { column: String },
    /// A nominal attribute with more distinct values than allowed, excluded from training
    TooManyNominalValues {
        column: String,
        count: usize,
        limit: usize,
    },
    /// Rows which were in-bag for every tree and therefore have no out-of-bag prediction
    RowsWithoutOobVotes { rows: usize },
    /// Training stopped before the requested number of trees was grown
    IncompleteEnsemble { trained: usize, requested: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EmptyColumnDomain { column } => {
                write!(f, "column `{}` has no values and is ignored", column)
            }
            Warning::TooManyNominalValues {
                column,
                count,
                limit,
            } => write!(
                f,
                "column `{}` has {} distinct values (limit {}) and is ignored",
                column, count, limit
            ),
            Warning::RowsWithoutOobVotes { rows } => write!(
                f,
                "{} rows were used by every tree and have no out-of-bag prediction",
                rows
            ),
            Warning::IncompleteEnsemble { trained, requested } => write!(
                f,
                "ensemble holds {} of {} requested trees",
                trained, requested
            ),
        }
    }
}
