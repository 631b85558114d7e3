//! Per attribute and tree level split counts
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use sylva::dataset::{Cell, ColumnSpec, DataTable};
use sylva::error::Result;

/// How often every attribute was a split candidate and how often it was chosen, per tree level
///
/// Level 0 is the root. Statistics of several trees are combined with [`SplitStatistics::merge`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SplitStatistics {
    attribute_names: Vec<String>,
    /// `splits[attribute][level]`
    splits: Vec<Vec<usize>>,
    candidates: Vec<Vec<usize>>,
}

impl SplitStatistics {
    pub fn new(attribute_names: Vec<String>) -> Self {
        let n = attribute_names.len();
        SplitStatistics {
            attribute_names,
            splits: vec![Vec::new(); n],
            candidates: vec![Vec::new(); n],
        }
    }

    fn increment(counts: &mut Vec<usize>, level: usize) {
        if counts.len() <= level {
            counts.resize(level + 1, 0);
        }
        counts[level] += 1;
    }

    pub fn record_split(&mut self, attribute: usize, level: usize) {
        Self::increment(&mut self.splits[attribute], level);
    }

    pub fn record_candidates(&mut self, attributes: &[usize], level: usize) {
        for &attribute in attributes {
            Self::increment(&mut self.candidates[attribute], level);
        }
    }

    /// Adds the counts of another tree grown on the same attributes
    ///
    /// ### Panics
    ///
    /// If the attribute lists differ
    pub fn merge(&mut self, other: &SplitStatistics) {
        assert_eq!(
            self.attribute_names, other.attribute_names,
            "split statistics over different attributes"
        );
        for (mine, theirs) in self
            .splits
            .iter_mut()
            .zip(&other.splits)
            .chain(self.candidates.iter_mut().zip(&other.candidates))
        {
            if mine.len() < theirs.len() {
                mine.resize(theirs.len(), 0);
            }
            mine.iter_mut().zip(theirs).for_each(|(m, t)| *m += t);
        }
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Number of levels with at least one candidate
    pub fn n_levels(&self) -> usize {
        self.splits
            .iter()
            .chain(&self.candidates)
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
    }

    pub fn splits(&self, attribute: usize, level: usize) -> usize {
        self.splits[attribute].get(level).copied().unwrap_or(0)
    }

    pub fn candidates(&self, attribute: usize, level: usize) -> usize {
        self.candidates[attribute].get(level).copied().unwrap_or(0)
    }

    /// Renders the counts as a table
    ///
    /// One row per attribute, keyed by the attribute name, with the columns
    /// `#splits (level 0)`, `#splits (level 1)`, ... followed by
    /// `#candidates (level 0)`, `#candidates (level 1)`, ...
    pub fn to_table(&self) -> Result<DataTable> {
        let levels = self.n_levels();
        let columns = (0..levels)
            .map(|l| ColumnSpec::numeric(format!("#splits (level {})", l)))
            .chain((0..levels).map(|l| ColumnSpec::numeric(format!("#candidates (level {})", l))))
            .collect();

        let mut table = DataTable::new(columns);
        for (attribute, name) in self.attribute_names.iter().enumerate() {
            let cells = (0..levels)
                .map(|l| self.splits(attribute, l))
                .chain((0..levels).map(|l| self.candidates(attribute, l)))
                .map(|count| Cell::Numeric(count as f64))
                .collect();
            table.push_row(name.clone(), cells)?;
        }
        Ok(table)
    }
}
