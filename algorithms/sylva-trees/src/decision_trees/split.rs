//! Best split search
//!
//! For every candidate attribute the rows of a node are scanned once, moving rows from the right
//! to the left child and keeping the target statistics of both sides up to date. The best split
//! over all candidates maximizes the gain of the configured [`SplitCriterion`].
use sylva::bitset::BitSet;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::data::{AttributeColumn, BitColumn, NumericColumn, TreeData};
use super::hyperparams::{MissingValueStrategy, SplitCriterion, ThresholdConvention};
use super::nominal;
use super::schema::Value;
use super::stats::{split_gain, NodeStats};

/// Child of a binary split
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum SplitKind {
    /// `value <= threshold` goes left
    Numeric { threshold: f64 },
    /// Categories in `left` go left, categories in `right` go right. Categories in neither set
    /// were not seen in the node and are routed like missing values.
    Nominal { left: BitSet, right: BitSet },
    /// A clear bit goes left, a set bit goes right
    BitPresence,
}

/// A binary split of a node
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    attribute: usize,
    kind: SplitKind,
    missing_direction: Direction,
    gain: f64,
}

impl Split {
    pub fn new(attribute: usize, kind: SplitKind, missing_direction: Direction, gain: f64) -> Self {
        Split {
            attribute,
            kind,
            missing_direction,
            gain,
        }
    }

    /// Id of the split attribute
    pub fn attribute(&self) -> usize {
        self.attribute
    }

    pub fn kind(&self) -> &SplitKind {
        &self.kind
    }

    /// Child receiving rows with a missing (or unknown) value
    pub fn missing_direction(&self) -> Direction {
        self.missing_direction
    }

    /// Impurity decrease (or gain ratio) achieved on the training rows
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Child receiving a row with the given value of the split attribute
    pub fn route(&self, value: Value) -> Direction {
        let direction = match (&self.kind, value) {
            (SplitKind::Numeric { threshold }, Value::Number(v)) => Some(if v <= *threshold {
                Direction::Left
            } else {
                Direction::Right
            }),
            (SplitKind::Nominal { left, right }, Value::Category(c)) => {
                if left.contains(c as usize) {
                    Some(Direction::Left)
                } else if right.contains(c as usize) {
                    Some(Direction::Right)
                } else {
                    None
                }
            }
            (SplitKind::BitPresence, Value::Bit(set)) => Some(if set {
                Direction::Right
            } else {
                Direction::Left
            }),
            _ => None,
        };
        direction.unwrap_or(self.missing_direction)
    }
}

/// Best split found for a single attribute
pub(crate) struct Candidate {
    pub kind: SplitKind,
    pub gain: f64,
    pub direction: Direction,
}

/// Split search over the rows of one tree's sample
pub(crate) struct SplitSearch<'a> {
    pub data: &'a TreeData,
    /// Sample count of every row, zero for rows outside of the sample
    pub weights: &'a [f64],
    pub criterion: SplitCriterion,
    pub min_child_node_size: f64,
    pub missing_value_strategy: MissingValueStrategy,
    pub threshold_convention: ThresholdConvention,
    pub use_binary_nominal_splits: bool,
}

impl<'a> SplitSearch<'a> {
    /// Finds the split with the highest gain over the `candidates` attributes
    ///
    /// `rows` are the node's rows in ascending order, `mask` holds the same rows as a bitset and
    /// `stats` their target statistics. Ties between attributes go to the attribute listed first.
    /// Returns `None` if no split has a positive gain.
    ///
    /// ### Panics
    ///
    /// If `rows` is empty
    pub fn find_best_split(
        &self,
        rows: &[usize],
        mask: &BitSet,
        candidates: &[usize],
        stats: &NodeStats,
    ) -> Option<Split> {
        assert!(!rows.is_empty(), "split search on an empty node");

        let parent_impurity = stats.impurity(self.criterion);
        let mut best: Option<Split> = None;

        for &attribute in candidates {
            let candidate = match self.data.column(attribute) {
                AttributeColumn::Numeric(column) => self.numeric(column, rows, mask, stats),
                AttributeColumn::Nominal(column) => {
                    nominal::best_candidate(self, column, rows, mask, stats)
                }
                AttributeColumn::Bit(column) => self.bit(column, rows, stats),
            };

            if let Some(candidate) = candidate {
                if best.as_ref().map(|b| candidate.gain > b.gain).unwrap_or(true) {
                    best = Some(Split::new(
                        attribute,
                        candidate.kind,
                        candidate.direction,
                        candidate.gain,
                    ));
                }
            }
        }

        // guards against splits which only decrease the impurity by rounding noise
        let min_gain = match self.criterion {
            SplitCriterion::InformationGainRatio => 1e-12,
            _ => parent_impurity * 1e-12,
        };
        best.filter(|split| split.gain > min_gain)
    }

    pub(crate) fn scan<'s>(&'s self, parent: &NodeStats, missing: &'s NodeStats) -> Scan<'s> {
        let present = parent.merged(&missing.negated());
        Scan {
            search: self,
            parent_impurity: parent.impurity(self.criterion),
            present_impurity: present.impurity(self.criterion),
            missing,
            best: None,
        }
    }

    fn numeric(
        &self,
        column: &NumericColumn,
        rows: &[usize],
        mask: &BitSet,
        stats: &NodeStats,
    ) -> Option<Candidate> {
        let target = self.data.target();
        let m = rows.len() as f64;
        let use_local_sort = m * m.log2() < column.sorted().len() as f64;
        let (sorted, missing_rows) = node_values(column, rows, mask, use_local_sort);

        let (first, last) = (sorted.first()?.0, sorted.last()?.0);
        if first == last {
            return None;
        }

        let missing = NodeStats::of_rows(target, &missing_rows, self.weights);
        let mut left = stats.cleared();
        let mut right = stats.cleared();
        for &(_, row) in &sorted {
            right.add(target, row, self.weights[row]);
        }

        let mut scan = self.scan(stats, &missing);
        for i in 0..sorted.len() - 1 {
            let (value, row) = sorted[i];
            let w = self.weights[row];
            left.add(target, row, w);
            right.remove(target, row, w);

            let next = sorted[i + 1].0;
            // equal values end up in the same child
            if next == value {
                continue;
            }

            let threshold = self.threshold_convention.threshold(value, next);
            scan.offer(&left, &right, move || SplitKind::Numeric { threshold });
        }

        scan.finish()
    }

    fn bit(&self, column: &BitColumn, rows: &[usize], stats: &NodeStats) -> Option<Candidate> {
        let target = self.data.target();
        let mut clear = stats.cleared();
        let mut set = stats.cleared();
        let mut missing = stats.cleared();

        for &row in rows {
            let w = self.weights[row];
            match column.value(row) {
                Some(false) => clear.add(target, row, w),
                Some(true) => set.add(target, row, w),
                None => missing.add(target, row, w),
            }
        }

        if clear.weight() <= 0.0 || set.weight() <= 0.0 {
            return None;
        }

        let mut scan = self.scan(stats, &missing);
        scan.offer(&clear, &set, || SplitKind::BitPresence);
        scan.finish()
    }
}

/// Non-missing `(value, row)` pairs of a node in ascending order (ties by row) and the node's
/// missing rows
///
/// Small nodes sort their own rows, large nodes filter the presorted column. Both give the same
/// result.
fn node_values(
    column: &NumericColumn,
    rows: &[usize],
    mask: &BitSet,
    use_local_sort: bool,
) -> (Vec<(f64, usize)>, Vec<usize>) {
    if use_local_sort {
        let mut sorted: Vec<(f64, usize)> = rows
            .iter()
            .filter_map(|&row| column.value(row).map(|v| (v, row)))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let missing = rows
            .iter()
            .copied()
            .filter(|&row| column.value(row).is_none())
            .collect();
        (sorted, missing)
    } else {
        let sorted = column
            .sorted()
            .iter()
            .copied()
            .filter(|&(_, row)| mask.contains(row))
            .collect();
        let missing = column
            .missing()
            .iter()
            .copied()
            .filter(|&row| mask.contains(row))
            .collect();
        (sorted, missing)
    }
}

struct ScanBest {
    score: f64,
    direction: Direction,
    left: NodeStats,
    right: NodeStats,
    kind: SplitKind,
}

/// Keeps the best of a sequence of candidate partitions of one attribute
///
/// Candidates are offered as the statistics of their non-missing left and right rows, missing
/// rows are assigned according to the [`MissingValueStrategy`].
pub(crate) struct Scan<'s> {
    search: &'s SplitSearch<'s>,
    parent_impurity: f64,
    present_impurity: f64,
    missing: &'s NodeStats,
    best: Option<ScanBest>,
}

impl<'s> Scan<'s> {
    fn has_missing(&self) -> bool {
        self.missing.weight() > 0.0
    }

    fn fits(&self, left: &NodeStats, right: &NodeStats) -> bool {
        let min = self.search.min_child_node_size;
        left.weight() >= min && right.weight() >= min
    }

    /// Gain and direction of sending the missing rows to the better child
    fn with_missing(&self, left: &NodeStats, right: &NodeStats) -> Option<(f64, Direction)> {
        let mut best: Option<(f64, Direction)> = None;
        for &direction in &[Direction::Left, Direction::Right] {
            let (l, r) = match direction {
                Direction::Left => (left.merged(self.missing), right.clone()),
                Direction::Right => (left.clone(), right.merged(self.missing)),
            };
            if !self.fits(&l, &r) {
                continue;
            }
            let gain = split_gain(self.search.criterion, self.parent_impurity, &l, &r);
            if best.map(|(b, _)| gain > b).unwrap_or(true) {
                best = Some((gain, direction));
            }
        }
        best
    }

    pub fn offer<F: FnOnce() -> SplitKind>(&mut self, left: &NodeStats, right: &NodeStats, kind: F) {
        let scored = match self.search.missing_value_strategy {
            MissingValueStrategy::AlwaysSearchBothDirections if self.has_missing() => {
                self.with_missing(left, right)
            }
            _ if self.fits(left, right) => Some((
                split_gain(self.search.criterion, self.present_impurity, left, right),
                majority_direction(left, right),
            )),
            _ => None,
        };

        if let Some((score, direction)) = scored {
            if self.best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                self.best = Some(ScanBest {
                    score,
                    direction,
                    left: left.clone(),
                    right: right.clone(),
                    kind: kind(),
                });
            }
        }
    }

    pub fn finish(self) -> Option<Candidate> {
        let best = self.best.as_ref()?;
        let (gain, direction) = match self.search.missing_value_strategy {
            MissingValueStrategy::AfterBestSplit if self.has_missing() => {
                self.with_missing(&best.left, &best.right)?
            }
            _ => (best.score, best.direction),
        };
        let kind = self.best.map(|b| b.kind)?;

        Some(Candidate {
            kind,
            gain,
            direction,
        })
    }
}

/// Child receiving the majority of the non-missing weight, left on ties
fn majority_direction(left: &NodeStats, right: &NodeStats) -> Direction {
    if left.weight() >= right.weight() {
        Direction::Left
    } else {
        Direction::Right
    }
}
