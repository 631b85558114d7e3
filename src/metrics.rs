//! Common metrics for performance evaluation
//!
//! Classification predictions are evaluated with a [`ConfusionMatrix`], regression predictions
//! with the mean squared error and the coefficient of determination.
use std::fmt;

use ndarray::prelude::*;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Confusion matrix for multi-class evaluation
///
/// Rows correspond to the ground truth and columns to the prediction, so the diagonal holds the
/// correct predictions. Members are ordered as passed to [`ConfusionMatrix::from_indices`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    matrix: Array2<usize>,
    members: Vec<String>,
}

impl ConfusionMatrix {
    /// Counts `(ground truth, prediction)` pairs of class indices
    ///
    /// ### Panics
    ///
    /// If an index is not smaller than the number of members
    pub fn from_indices<I>(members: &[String], pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut matrix = Array2::zeros((members.len(), members.len()));
        for (t, p) in pairs {
            matrix[(t, p)] += 1;
        }

        ConfusionMatrix {
            matrix,
            members: members.to_vec(),
        }
    }

    pub fn matrix(&self) -> ArrayView2<'_, usize> {
        self.matrix.view()
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of evaluated pairs
    pub fn total(&self) -> usize {
        self.matrix.sum()
    }

    /// Share of correct predictions, `NaN` for an empty matrix
    pub fn accuracy(&self) -> f64 {
        self.matrix.diag().sum() as f64 / self.total() as f64
    }

    /// Precision for every class, `NaN` for classes which were never predicted
    pub fn precision(&self) -> Array1<f64> {
        let predicted = self.matrix.sum_axis(Axis(0));

        self.matrix
            .diag()
            .iter()
            .zip(predicted.iter())
            .map(|(&a, &b)| a as f64 / b as f64)
            .collect()
    }

    /// Recall for every class, `NaN` for classes absent from the ground truth
    pub fn recall(&self) -> Array1<f64> {
        let actual = self.matrix.sum_axis(Axis(1));

        self.matrix
            .diag()
            .iter()
            .zip(actual.iter())
            .map(|(&a, &b)| a as f64 / b as f64)
            .collect()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.members.iter().map(|m| m.len()).max().unwrap_or(0).max(6);

        write!(f, "{:>w$} |", "", w = width)?;
        for m in &self.members {
            write!(f, " {:>w$}", m, w = width)?;
        }
        writeln!(f)?;

        for (m, row) in self.members.iter().zip(self.matrix.outer_iter()) {
            write!(f, "{:>w$} |", m, w = width)?;
            for count in row {
                write!(f, " {:>w$}", count, w = width)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

fn check_lengths(prediction: &[f64], ground_truth: &[f64]) -> Result<()> {
    if prediction.len() != ground_truth.len() {
        return Err(Error::RowCountMismatch {
            expected: ground_truth.len(),
            found: prediction.len(),
        });
    }
    if prediction.is_empty() {
        return Err(Error::EmptyTable);
    }
    Ok(())
}

/// Mean squared error between prediction and ground truth
pub fn mean_squared_error(prediction: &[f64], ground_truth: &[f64]) -> Result<f64> {
    check_lengths(prediction, ground_truth)?;

    let diff = ArrayView1::from(prediction).to_owned() - ArrayView1::from(ground_truth);
    Ok(diff.mapv(|x| x * x).sum() / diff.len() as f64)
}

/// Coefficient of determination, the share of the ground truth variance explained by the
/// prediction
///
/// A constant ground truth gives `NaN` or negative infinity.
pub fn r2(prediction: &[f64], ground_truth: &[f64]) -> Result<f64> {
    check_lengths(prediction, ground_truth)?;

    let truth = ArrayView1::from(ground_truth);
    let mean = truth.sum() / truth.len() as f64;
    let residual = (&truth - &ArrayView1::from(prediction)).mapv(|x| x * x).sum();
    let total = truth.mapv(|x| (x - mean) * (x - mean)).sum();

    Ok(1.0 - residual / total)
}
