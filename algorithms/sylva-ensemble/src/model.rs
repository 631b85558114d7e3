use std::sync::Arc;

use tracing::warn;

use sylva::{
    dataset::DataTable,
    error::{Error, Result},
    sample::RowSample,
    warning::Warning,
};
use sylva_trees::{AttributeValues, DecisionTree, Schema, SplitStatistics, TreeNode};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::voting::{Votes, VotingMethod};

/// A tree of a forest together with the rows it was grown on
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleMember {
    tree: DecisionTree,
    sample: Option<RowSample>,
    seed: u64,
}

impl EnsembleMember {
    pub fn new(tree: DecisionTree, sample: Option<RowSample>, seed: u64) -> Self {
        EnsembleMember { tree, sample, seed }
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// The row sample, if samples were stored
    pub fn sample(&self) -> Option<&RowSample> {
        self.sample.as_ref()
    }

    /// Seed the tree's sample and attribute subsets were drawn with
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// A fitted random forest
///
/// Holds the trees in training order. A forest whose training was cancelled holds fewer trees
/// than requested and reports itself as incomplete, it can still be used for predictions.
///
/// See [`RandomForest::params`] for training and [`PredictorOptions`](crate::PredictorOptions)
/// for table predictions.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    schema: Arc<Schema>,
    members: Vec<EnsembleMember>,
    statistics: SplitStatistics,
    warnings: Vec<Warning>,
    requested: usize,
}

impl RandomForest {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn trees(&self) -> impl Iterator<Item = &DecisionTree> + '_ {
        self.members.iter().map(|m| &m.tree)
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Number of trees training was asked for
    pub fn requested_trees(&self) -> usize {
        self.requested
    }

    pub fn is_complete(&self) -> bool {
        self.members.len() == self.requested
    }

    /// Degraded output conditions raised while training
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Split statistics summed over all trees
    pub fn statistics(&self) -> &SplitStatistics {
        &self.statistics
    }

    /// The summed split statistics as a table, one row per attribute
    pub fn statistics_table(&self) -> Result<DataTable> {
        self.statistics.to_table()
    }

    /// The leaf reached by a record in every tree, in training order
    pub fn leaves<V: AttributeValues + ?Sized>(&self, record: &V) -> Vec<&TreeNode> {
        self.trees().map(|tree| tree.leaf(record)).collect()
    }

    /// Combined votes of every tree
    pub fn vote<V: AttributeValues + ?Sized>(&self, record: &V, method: VotingMethod) -> Votes {
        self.vote_of(record, method, |_| true)
    }

    /// Combined votes of the trees accepted by `include`
    pub(crate) fn vote_of<V, F>(&self, record: &V, method: VotingMethod, include: F) -> Votes
    where
        V: AttributeValues + ?Sized,
        F: Fn(&EnsembleMember) -> bool,
    {
        let n_classes = self.schema.n_classes();
        self.members
            .iter()
            .filter(|member| include(member))
            .map(|member| Votes::of_leaf(member.tree.leaf(record), method, n_classes))
            .fold(Votes::empty(n_classes), Votes::combine)
    }

    /// Impurity decrease of every attribute averaged over the trees, sums up to one unless every
    /// tree is a single leaf
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.schema.n_attributes()];
        for tree in self.trees() {
            importance
                .iter_mut()
                .zip(tree.feature_importance())
                .for_each(|(sum, i)| *sum += i);
        }

        let sum: f64 = importance.iter().sum();
        if sum > 0.0 {
            importance.iter_mut().for_each(|i| *i /= sum);
        }
        importance
    }
}

/// Assembles a [`RandomForest`] from trees grown on the same schema
#[derive(Debug, Clone)]
pub struct EnsembleBuilder {
    schema: Arc<Schema>,
    members: Vec<EnsembleMember>,
    statistics: SplitStatistics,
    requested: usize,
}

impl EnsembleBuilder {
    pub fn new(schema: Arc<Schema>, requested: usize) -> Self {
        let statistics = SplitStatistics::new(
            schema
                .attributes()
                .iter()
                .map(|a| a.name().to_string())
                .collect(),
        );
        EnsembleBuilder {
            schema,
            members: Vec::with_capacity(requested),
            statistics,
            requested,
        }
    }

    /// Appends a tree, which has to be grown on the builder's schema
    pub fn add_tree(&mut self, member: EnsembleMember) -> Result<()> {
        if *member.tree.schema() != self.schema {
            return Err(Error::Parameters(
                "tree was grown on a different schema".to_string(),
            ));
        }
        self.statistics.merge(member.tree.statistics());
        self.members.push(member);
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Finishes the forest, which is incomplete if it holds fewer trees than requested
    pub fn finalize(self) -> Result<RandomForest> {
        if self.members.is_empty() {
            return Err(Error::Parameters(
                "a forest needs at least one tree".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        if self.members.len() < self.requested {
            let warning = Warning::IncompleteEnsemble {
                trained: self.members.len(),
                requested: self.requested,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(RandomForest {
            schema: self.schema,
            members: self.members,
            statistics: self.statistics,
            warnings,
            requested: self.requested,
        })
    }
}
