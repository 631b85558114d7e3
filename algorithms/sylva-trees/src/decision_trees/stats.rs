//! Sufficient statistics of the target over a set of weighted rows
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::data::TargetColumn;
use super::hyperparams::SplitCriterion;

/// Target statistics of a node or of one side of a candidate split
///
/// Weights are the number of times a row was drawn into the tree's sample, so duplicates of a
/// bootstrap count as often as they were drawn.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStats {
    /// Weighted count per class id
    Classification { counts: Vec<f64> },
    /// Weight, weighted mean and weighted sum of squared deviations from the mean
    ///
    /// The moments are updated incrementally, so a constant target keeps `m2` at exactly zero
    /// regardless of its magnitude.
    Regression { weight: f64, mean: f64, m2: f64 },
}

impl NodeStats {
    const EMPTY_REGRESSION: NodeStats = NodeStats::Regression {
        weight: 0.0,
        mean: 0.0,
        m2: 0.0,
    };

    /// Empty statistics matching the kind of a target
    pub fn empty(target: &TargetColumn) -> Self {
        match target {
            TargetColumn::Classes { n_classes, .. } => NodeStats::Classification {
                counts: vec![0.0; *n_classes],
            },
            TargetColumn::Numeric { .. } => NodeStats::EMPTY_REGRESSION,
        }
    }

    /// Empty statistics of the same kind and size
    pub fn cleared(&self) -> Self {
        match self {
            NodeStats::Classification { counts } => NodeStats::Classification {
                counts: vec![0.0; counts.len()],
            },
            NodeStats::Regression { .. } => NodeStats::EMPTY_REGRESSION,
        }
    }

    /// Statistics of `rows`, weighted by `weights[row]`
    pub fn of_rows(target: &TargetColumn, rows: &[usize], weights: &[f64]) -> Self {
        let mut stats = NodeStats::empty(target);
        for &row in rows {
            stats.add(target, row, weights[row]);
        }
        stats
    }

    pub fn add(&mut self, target: &TargetColumn, row: usize, w: f64) {
        match (self, target) {
            (NodeStats::Classification { counts }, TargetColumn::Classes { codes, .. }) => {
                counts[codes[row] as usize] += w;
            }
            (NodeStats::Regression { weight, mean, m2 }, TargetColumn::Numeric { values }) => {
                let y = values[row];
                let total = *weight + w;
                if total <= 0.0 {
                    (*weight, *mean, *m2) = (0.0, 0.0, 0.0);
                } else if *weight <= 0.0 {
                    (*weight, *mean, *m2) = (total, y, 0.0);
                } else {
                    // Welford, a negative weight reverses an earlier update
                    let delta = y - *mean;
                    let updated = *mean + w * delta / total;
                    *m2 = (*m2 + w * delta * (y - updated)).max(0.0);
                    *mean = updated;
                    *weight = total;
                }
            }
            _ => panic!("node statistics do not match the target kind"),
        }
    }

    pub fn remove(&mut self, target: &TargetColumn, row: usize, w: f64) {
        self.add(target, row, -w);
    }

    /// Statistics with every weight negated, merging them subtracts
    pub fn negated(&self) -> Self {
        match self {
            NodeStats::Classification { counts } => NodeStats::Classification {
                counts: counts.iter().map(|c| -c).collect(),
            },
            NodeStats::Regression { weight, mean, m2 } => NodeStats::Regression {
                weight: -weight,
                mean: *mean,
                m2: -m2,
            },
        }
    }

    /// Adds another set of statistics of the same kind
    pub fn merge(&mut self, other: &NodeStats) {
        match (self, other) {
            (NodeStats::Classification { counts }, NodeStats::Classification { counts: o }) => {
                counts.iter_mut().zip(o).for_each(|(c, o)| *c += o);
            }
            (
                NodeStats::Regression { weight, mean, m2 },
                NodeStats::Regression {
                    weight: ow,
                    mean: om,
                    m2: om2,
                },
            ) => {
                // Chan et al., merging negated statistics subtracts them
                if *ow == 0.0 {
                    return;
                }
                let total = *weight + ow;
                if *weight == 0.0 {
                    (*weight, *mean, *m2) = (*ow, *om, *om2);
                } else if total <= 0.0 {
                    (*weight, *mean, *m2) = (0.0, 0.0, 0.0);
                } else {
                    let delta = om - *mean;
                    *m2 = (*m2 + om2 + delta * delta * *weight * ow / total).max(0.0);
                    *mean += delta * ow / total;
                    *weight = total;
                }
            }
            _ => panic!("cannot merge classification and regression statistics"),
        }
    }

    /// `self + other` without modifying either
    pub fn merged(&self, other: &NodeStats) -> NodeStats {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    pub fn weight(&self) -> f64 {
        match self {
            NodeStats::Classification { counts } => counts.iter().sum(),
            NodeStats::Regression { weight, .. } => *weight,
        }
    }

    /// True if no split can decrease the impurity any further
    pub fn is_pure(&self) -> bool {
        match self {
            NodeStats::Classification { counts } => counts.iter().filter(|&&c| c > 0.0).count() <= 1,
            NodeStats::Regression { weight, mean, m2 } => *m2 <= f64::EPSILON * weight * mean * mean,
        }
    }

    /// Class with the highest weight, ties go to the lowest class id
    pub fn majority_class(&self) -> Option<usize> {
        match self {
            NodeStats::Classification { counts } => {
                let mut best: Option<(usize, f64)> = None;
                for (class, &c) in counts.iter().enumerate() {
                    if best.map(|(_, b)| c > b).unwrap_or(true) {
                        best = Some((class, c));
                    }
                }
                best.map(|(class, _)| class)
            }
            NodeStats::Regression { .. } => None,
        }
    }

    /// Class probabilities, empty for regression and all zero for an empty node
    pub fn class_probabilities(&self) -> Vec<f64> {
        match self {
            NodeStats::Classification { counts } => {
                let total = self.weight();
                counts
                    .iter()
                    .map(|&c| if total > 0.0 { c / total } else { 0.0 })
                    .collect()
            }
            NodeStats::Regression { .. } => Vec::new(),
        }
    }

    /// Mean target value, `None` for classification and for an empty node
    pub fn mean(&self) -> Option<f64> {
        match self {
            NodeStats::Regression { weight, mean, .. } if *weight > 0.0 => Some(*mean),
            _ => None,
        }
    }

    /// Weighted sum of squared deviations from the mean
    pub fn sum_squared_error(&self) -> f64 {
        match self {
            NodeStats::Regression { weight, m2, .. } if *weight > 0.0 => *m2,
            _ => 0.0,
        }
    }

    /// Impurity scaled by the node weight, so that the gain of a split is
    /// `parent.impurity() - left.impurity() - right.impurity()`
    pub fn impurity(&self, criterion: SplitCriterion) -> f64 {
        match (self, criterion) {
            (NodeStats::Regression { .. }, _) => self.sum_squared_error(),
            (NodeStats::Classification { counts }, SplitCriterion::Gini) => {
                weighted_gini(counts)
            }
            (NodeStats::Classification { counts }, _) => weighted_entropy(counts),
        }
    }
}

/// `n * (1 - sum p_i^2)`
fn weighted_gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    total - counts.iter().map(|c| c * c).sum::<f64>() / total
}

/// `n * -sum p_i log2 p_i`
fn weighted_entropy(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| -c * (c / total).log2())
        .sum()
}

/// Entropy of the partition itself, scaled by the total weight
pub(crate) fn weighted_split_info(left: f64, right: f64) -> f64 {
    weighted_entropy(&[left, right])
}

/// Gain of splitting `parent_impurity` into `left` and `right`
pub(crate) fn split_gain(
    criterion: SplitCriterion,
    parent_impurity: f64,
    left: &NodeStats,
    right: &NodeStats,
) -> f64 {
    let gain = parent_impurity - left.impurity(criterion) - right.impurity(criterion);
    match criterion {
        SplitCriterion::InformationGainRatio => {
            let split_info = weighted_split_info(left.weight(), right.weight());
            if split_info > 0.0 {
                gain / split_info
            } else {
                0.0
            }
        }
        _ => gain,
    }
}
