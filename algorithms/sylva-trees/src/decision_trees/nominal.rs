//! Binary partitions of nominal attributes
//!
//! Searching all `2^(k-1)` partitions of `k` categories is infeasible for larger domains. The
//! categories present in a node are therefore put in a linear order and only the `k - 1` prefix
//! partitions of that order are evaluated:
//!
//! * numeric targets and two classes: order by mean target (by class 1 proportion), which
//!   contains the optimal partition
//! * more classes: order by the projection of the class probability vectors on their first
//!   principal component
//!
//! With binary nominal splits disabled every category is tried against the rest instead.
use ndarray::{Array1, Array2, Axis};

use sylva::bitset::BitSet;

use super::data::NominalColumn;
use super::split::{Candidate, SplitKind, SplitSearch};
use super::stats::NodeStats;

const POWER_ITERATIONS: usize = 100;
const POWER_TOLERANCE: f64 = 1e-10;

pub(crate) fn best_candidate(
    search: &SplitSearch<'_>,
    column: &NominalColumn,
    rows: &[usize],
    mask: &BitSet,
    stats: &NodeStats,
) -> Option<Candidate> {
    let target = search.data.target();
    let n_values = column.n_values();

    let mut per_category = vec![stats.cleared(); n_values];
    let mut missing = stats.cleared();
    if rows.len() * 8 >= target.len() {
        // large node, walk the value bitsets
        for (code, category) in per_category.iter_mut().enumerate() {
            for row in column.rows_with(code as u32).intersection(mask) {
                category.add(target, row, search.weights[row]);
            }
        }
        for &row in column.missing().iter().filter(|&&row| mask.contains(row)) {
            missing.add(target, row, search.weights[row]);
        }
    } else {
        for &row in rows {
            match column.code(row) {
                Some(code) => per_category[code as usize].add(target, row, search.weights[row]),
                None => missing.add(target, row, search.weights[row]),
            }
        }
    }

    let present: Vec<usize> = (0..n_values)
        .filter(|&c| per_category[c].weight() > 0.0)
        .collect();
    if present.len() < 2 {
        return None;
    }

    let mut scan = search.scan(stats, &missing);
    let mut present_stats = stats.cleared();
    for &c in &present {
        present_stats.merge(&per_category[c]);
    }

    if !search.use_binary_nominal_splits {
        for &c in &present {
            let left = &per_category[c];
            let right = present_stats.merged(&left.negated());
            scan.offer(left, &right, || SplitKind::Nominal {
                left: BitSet::from_indices(n_values, vec![c]),
                right: BitSet::from_indices(
                    n_values,
                    present.iter().copied().filter(|&o| o != c),
                ),
            });
        }
        return scan.finish();
    }

    let order = category_order(&present, &per_category, &present_stats);

    let mut left = stats.cleared();
    let mut right = present_stats.clone();
    for i in 0..order.len() - 1 {
        left.merge(&per_category[order[i]]);
        right.merge(&per_category[order[i]].negated());

        let order = &order;
        scan.offer(&left, &right, || SplitKind::Nominal {
            left: BitSet::from_indices(n_values, order[..=i].iter().copied()),
            right: BitSet::from_indices(n_values, order[i + 1..].iter().copied()),
        });
    }

    scan.finish()
}

/// Linear order of the present categories, ties keep the category order
fn category_order(present: &[usize], per_category: &[NodeStats], total: &NodeStats) -> Vec<usize> {
    let keys: Vec<f64> = match total {
        NodeStats::Regression { .. } => present
            .iter()
            .map(|&c| per_category[c].mean().unwrap_or(0.0))
            .collect(),
        NodeStats::Classification { counts } if counts.len() <= 2 => present
            .iter()
            .map(|&c| {
                let p = per_category[c].class_probabilities();
                p.get(1).copied().unwrap_or(0.0)
            })
            .collect(),
        NodeStats::Classification { .. } => principal_component_scores(present, per_category, total),
    };

    let mut order: Vec<(f64, usize)> = keys.into_iter().zip(present.iter().copied()).collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0));
    order.into_iter().map(|(_, c)| c).collect()
}

/// Projection of every category's class probability vector on the first principal component
/// of the weighted probability vectors
fn principal_component_scores(
    present: &[usize],
    per_category: &[NodeStats],
    total: &NodeStats,
) -> Vec<f64> {
    let mean = Array1::from(total.class_probabilities());
    let k = mean.len();

    let probabilities: Vec<Array1<f64>> = present
        .iter()
        .map(|&c| Array1::from(per_category[c].class_probabilities()))
        .collect();

    let mut covariance = Array2::<f64>::zeros((k, k));
    for (&c, p) in present.iter().zip(&probabilities) {
        let deviation = (p - &mean).insert_axis(Axis(1));
        covariance.scaled_add(per_category[c].weight(), &deviation.dot(&deviation.t()));
    }

    // start from the deviation of the heaviest category, it is rarely orthogonal to the component
    let heaviest = (0..present.len())
        .max_by(|&a, &b| {
            per_category[present[a]]
                .weight()
                .total_cmp(&per_category[present[b]].weight())
        })
        .unwrap_or(0);
    let mut component = &probabilities[heaviest] - &mean;
    if component.dot(&component) <= 0.0 {
        component = Array1::ones(k);
    }
    component /= component.dot(&component).sqrt();

    for _ in 0..POWER_ITERATIONS {
        let mut next = covariance.dot(&component);
        let norm = next.dot(&next).sqrt();
        if norm <= POWER_TOLERANCE {
            break;
        }
        next /= norm;
        let change = (&next - &component)
            .iter()
            .fold(0.0f64, |max, d| max.max(d.abs()));
        component = next;
        if change <= POWER_TOLERANCE {
            break;
        }
    }

    probabilities.iter().map(|p| p.dot(&component)).collect()
}
