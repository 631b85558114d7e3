//! Out-of-bag (OOB) evaluation
//!
//! Every training row is predicted by the trees which did not see it during training. The
//! resulting predictions estimate the error on unseen data without a separate test set.
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use sylva::{
    error::{Error, Result},
    metrics::{mean_squared_error, r2, ConfusionMatrix},
    warning::Warning,
};
use sylva_trees::{TargetColumn, TreeData};

use crate::model::RandomForest;
use crate::voting::{Votes, VotingMethod};

/// Quality of the out-of-bag predictions, over the rows with at least one voting tree
#[derive(Debug, Clone, PartialEq)]
pub enum OobMetric {
    Classification {
        accuracy: f64,
        confusion: ConfusionMatrix,
    },
    Regression {
        mean_squared_error: f64,
        r2: f64,
    },
}

/// Out-of-bag predictions of every training row and their quality
#[derive(Debug, Clone)]
pub struct OobEstimate {
    votes: Vec<Votes>,
    metric: Option<OobMetric>,
    rows_without_votes: usize,
    warnings: Vec<Warning>,
}

impl OobEstimate {
    /// Combined votes of the out-of-bag trees, one entry per training row
    pub fn votes(&self) -> &[Votes] {
        &self.votes
    }

    /// `None` if no row has an out-of-bag tree
    pub fn metric(&self) -> Option<&OobMetric> {
        self.metric.as_ref()
    }

    pub fn accuracy(&self) -> Option<f64> {
        match self.metric {
            Some(OobMetric::Classification { accuracy, .. }) => Some(accuracy),
            _ => None,
        }
    }

    pub fn mean_squared_error(&self) -> Option<f64> {
        match self.metric {
            Some(OobMetric::Regression {
                mean_squared_error, ..
            }) => Some(mean_squared_error),
            _ => None,
        }
    }

    /// Rows which were in-bag for every tree
    pub fn rows_without_votes(&self) -> usize {
        self.rows_without_votes
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_votes(self) -> Vec<Votes> {
        self.votes
    }
}

impl RandomForest {
    /// Votes of the trees whose sample does not contain training row `row`
    ///
    /// Without such a tree the votes are empty, with a model count of zero.
    pub fn oob_votes(&self, data: &TreeData, row: usize, method: VotingMethod) -> Result<Votes> {
        self.check_oob_data(data)?;
        Ok(self.oob_votes_unchecked(data, row, method))
    }

    fn oob_votes_unchecked(&self, data: &TreeData, row: usize, method: VotingMethod) -> Votes {
        self.vote_of(&data.row(row), method, |member| {
            member
                .sample()
                .map(|sample| !sample.is_in_bag(row))
                .unwrap_or(false)
        })
    }

    fn check_oob_data(&self, data: &TreeData) -> Result<()> {
        let mut row_count = None;
        for member in self.members() {
            let sample = member.sample().ok_or(Error::NoRowSamples)?;
            row_count = Some(sample.row_count());
        }
        if let Some(expected) = row_count {
            if expected != data.nrows() {
                return Err(Error::RowCountMismatch {
                    expected,
                    found: data.nrows(),
                });
            }
        }
        if !Arc::ptr_eq(self.schema(), data.schema()) && **self.schema() != **data.schema() {
            return Err(Error::Parameters(
                "training data does not match the forest's schema".to_string(),
            ));
        }
        Ok(())
    }

    /// Out-of-bag predictions of the training data the forest was grown on
    ///
    /// Fails with `NoRowSamples` if the forest was trained without storing row samples. Rows
    /// which were in-bag for every tree get empty votes and are reported with a
    /// `RowsWithoutOobVotes` warning.
    pub fn oob_estimate(&self, data: &TreeData, method: VotingMethod) -> Result<OobEstimate> {
        self.check_oob_data(data)?;

        let votes: Vec<Votes> = (0..data.nrows())
            .into_par_iter()
            .map(|row| self.oob_votes_unchecked(data, row, method))
            .collect();

        let rows_without_votes = votes.iter().filter(|v| v.n_models() == 0).count();
        let mut warnings = Vec::new();
        if rows_without_votes > 0 {
            let warning = Warning::RowsWithoutOobVotes {
                rows: rows_without_votes,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        let metric = if rows_without_votes == votes.len() {
            None
        } else {
            Some(self.oob_metric(data, &votes)?)
        };
        info!(
            rows = data.nrows(),
            rows_without_votes,
            metric = ?metric,
            "out-of-bag estimate"
        );

        Ok(OobEstimate {
            votes,
            metric,
            rows_without_votes,
            warnings,
        })
    }

    fn oob_metric(&self, data: &TreeData, votes: &[Votes]) -> Result<OobMetric> {
        match data.target() {
            TargetColumn::Classes { codes, .. } => {
                let confusion = ConfusionMatrix::from_indices(
                    self.schema().classes(),
                    votes.iter().zip(codes).filter_map(|(v, &truth)| {
                        v.class_votes()
                            .and_then(|v| v.winner())
                            .map(|predicted| (truth as usize, predicted))
                    }),
                );
                Ok(OobMetric::Classification {
                    accuracy: confusion.accuracy(),
                    confusion,
                })
            }
            TargetColumn::Numeric { values } => {
                let (prediction, truth): (Vec<f64>, Vec<f64>) = votes
                    .iter()
                    .zip(values)
                    .filter_map(|(v, &truth)| {
                        v.regression_votes()
                            .and_then(|v| v.mean())
                            .map(|mean| (mean, truth))
                    })
                    .unzip();
                Ok(OobMetric::Regression {
                    mean_squared_error: mean_squared_error(&prediction, &truth)?,
                    r2: r2(&prediction, &truth)?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva::prelude::*;
    use sylva_trees::TreeDataBuilder;

    fn regression_data() -> Result<TreeData> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::numeric("y")]);
        for i in 0..40 {
            let x = i as f64;
            table.push_row(format!("Row{}", i), vec![Cell::Numeric(x), Cell::Numeric(2.0 * x)])?;
        }
        TreeDataBuilder::new("y").build(&table)
    }

    #[test]
    fn requires_stored_samples() -> Result<()> {
        let data = regression_data()?;
        let forest = RandomForest::params()
            .tree_count(2)
            .store_row_samples(false)
            .random_seed(5)
            .fit(&data)?;

        assert!(matches!(
            forest.oob_estimate(&data, VotingMethod::Hard),
            Err(Error::NoRowSamples)
        ));
        Ok(())
    }

    #[test]
    fn rows_used_by_every_tree_have_no_votes() -> Result<()> {
        let data = regression_data()?;
        // every tree sees every row
        let forest = RandomForest::params()
            .tree_count(3)
            .row_sampling_with_replacement(false)
            .random_seed(5)
            .fit(&data)?;

        let estimate = forest.oob_estimate(&data, VotingMethod::Hard)?;
        assert_eq!(estimate.rows_without_votes(), 40);
        assert_eq!(estimate.metric(), None);
        assert!(estimate.votes().iter().all(|v| v.n_models() == 0));
        assert_eq!(
            estimate.warnings(),
            &[Warning::RowsWithoutOobVotes { rows: 40 }]
        );
        Ok(())
    }

    #[test]
    fn regression_estimate() -> Result<()> {
        let data = regression_data()?;
        let forest = RandomForest::params()
            .tree_count(30)
            .attribute_sample_size(AttributeSampleSize::All)
            .random_seed(5)
            .fit(&data)?;

        let estimate = forest.oob_estimate(&data, VotingMethod::Hard)?;
        let mse = estimate.mean_squared_error().unwrap();
        assert!(mse < 25.0, "mse {}", mse);
        match estimate.metric() {
            Some(OobMetric::Regression { r2, .. }) => assert!(*r2 > 0.9),
            other => panic!("unexpected metric {:?}", other),
        }
        Ok(())
    }
}
