use sylva::{
    error::{Error, Result},
    sample::{AttributeSampleMode, AttributeSampleSize},
    ParamGuard,
};
use sylva_trees::{
    DecisionTree, DecisionTreeParams, MissingValueStrategy, SplitCriterion, ThresholdConvention,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::RandomForest;

/// The set of hyperparameters that can be specified for fitting a
/// [random forest](struct.RandomForest.html).
///
/// Every tree of the forest is grown with the same tree parameters, see
/// [`DecisionTreeParams`](sylva_trees::DecisionTreeParams). The forest adds the number of trees
/// and how the rows of every tree are drawn.
///
/// ### Example
///
/// ```rust
/// use sylva::prelude::*;
/// use sylva_ensemble::RandomForest;
/// use sylva_trees::TreeDataBuilder;
///
/// let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")]);
/// for i in 0..40 {
///     let class = if i < 20 { "low" } else { "high" };
///     table.push_row(format!("r{}", i), vec![Cell::Numeric(i as f64), class.into()])?;
/// }
/// let data = TreeDataBuilder::new("class").build(&table)?;
///
/// let params = RandomForest::params()
///     .tree_count(10)
///     .row_sampling_fraction(0.8)
///     .max_depth(Some(3))
///     .random_seed(1);
///
/// let forest = params.fit(&data)?;
/// assert_eq!(forest.n_trees(), 10);
/// assert!(forest.is_complete());
/// # Ok::<(), sylva::error::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct RandomForestValidParams {
    tree_params: DecisionTreeParams,
    tree_count: usize,
    row_sampling_fraction: f64,
    row_sampling_with_replacement: bool,
    stratified_sampling: bool,
    store_row_samples: bool,
    random_seed: Option<u64>,
}

impl RandomForestValidParams {
    /// Parameters every tree is grown with
    pub fn tree_params(&self) -> &DecisionTreeParams {
        &self.tree_params
    }

    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    pub fn row_sampling_fraction(&self) -> f64 {
        self.row_sampling_fraction
    }

    pub fn row_sampling_with_replacement(&self) -> bool {
        self.row_sampling_with_replacement
    }

    pub fn stratified_sampling(&self) -> bool {
        self.stratified_sampling
    }

    pub fn store_row_samples(&self) -> bool {
        self.store_row_samples
    }

    /// The master seed, `None` draws one from the thread local generator
    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct RandomForestParams(RandomForestValidParams);

impl RandomForestParams {
    pub fn new() -> Self {
        Self(RandomForestValidParams {
            tree_params: DecisionTree::params().attribute_sample_size(AttributeSampleSize::Sqrt),
            tree_count: 100,
            row_sampling_fraction: 1.0,
            row_sampling_with_replacement: true,
            stratified_sampling: false,
            store_row_samples: true,
            random_seed: None,
        })
    }

    /// Replaces the parameters of every tree
    pub fn tree_params(mut self, tree_params: DecisionTreeParams) -> Self {
        self.0.tree_params = tree_params;
        self
    }

    /// Sets the number of trees to grow
    pub fn tree_count(mut self, tree_count: usize) -> Self {
        self.0.tree_count = tree_count;
        self
    }

    /// Sets the share of rows drawn for every tree, in `(0, 1]`
    pub fn row_sampling_fraction(mut self, row_sampling_fraction: f64) -> Self {
        self.0.row_sampling_fraction = row_sampling_fraction;
        self
    }

    /// Sets whether rows are drawn with replacement (bootstrap) or without
    pub fn row_sampling_with_replacement(mut self, with_replacement: bool) -> Self {
        self.0.row_sampling_with_replacement = with_replacement;
        self
    }

    /// Draws the rows of every class separately, keeping the class distribution of the table.
    /// Only applies to a nominal target.
    pub fn stratified_sampling(mut self, stratified_sampling: bool) -> Self {
        self.0.stratified_sampling = stratified_sampling;
        self
    }

    /// Keeps the row sample of every tree in the model, required for out-of-bag estimates
    pub fn store_row_samples(mut self, store_row_samples: bool) -> Self {
        self.0.store_row_samples = store_row_samples;
        self
    }

    /// Sets the master seed from which the seed of every tree is drawn
    pub fn random_seed(mut self, random_seed: u64) -> Self {
        self.0.random_seed = Some(random_seed);
        self
    }

    pub fn split_criterion(mut self, split_criterion: SplitCriterion) -> Self {
        self.0.tree_params = self.0.tree_params.split_criterion(split_criterion);
        self
    }

    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.0.tree_params = self.0.tree_params.max_depth(max_depth);
        self
    }

    pub fn min_split_node_size(mut self, min_split_node_size: f64) -> Self {
        self.0.tree_params = self.0.tree_params.min_split_node_size(min_split_node_size);
        self
    }

    pub fn min_child_node_size(mut self, min_child_node_size: f64) -> Self {
        self.0.tree_params = self.0.tree_params.min_child_node_size(min_child_node_size);
        self
    }

    pub fn attribute_sample_size(mut self, attribute_sample_size: AttributeSampleSize) -> Self {
        self.0.tree_params = self.0.tree_params.attribute_sample_size(attribute_sample_size);
        self
    }

    pub fn attribute_sample_mode(mut self, attribute_sample_mode: AttributeSampleMode) -> Self {
        self.0.tree_params = self.0.tree_params.attribute_sample_mode(attribute_sample_mode);
        self
    }

    pub fn always_include_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.0.tree_params = self.0.tree_params.always_include_attribute(attribute);
        self
    }

    pub fn use_binary_nominal_splits(mut self, use_binary_nominal_splits: bool) -> Self {
        self.0.tree_params = self
            .0
            .tree_params
            .use_binary_nominal_splits(use_binary_nominal_splits);
        self
    }

    pub fn missing_value_strategy(mut self, missing_value_strategy: MissingValueStrategy) -> Self {
        self.0.tree_params = self.0.tree_params.missing_value_strategy(missing_value_strategy);
        self
    }

    pub fn threshold_convention(mut self, threshold_convention: ThresholdConvention) -> Self {
        self.0.tree_params = self.0.tree_params.threshold_convention(threshold_convention);
        self
    }
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForest {
    /// Defaults are provided if the optional parameters are not specified:
    /// * `tree_count = 100`
    /// * `row_sampling_fraction = 1.0`
    /// * `row_sampling_with_replacement = true`
    /// * `stratified_sampling = false`
    /// * `store_row_samples = true`
    /// * `random_seed = None`
    /// * `attribute_sample_size = Sqrt`, the other tree parameters keep the defaults of
    ///   [`DecisionTree::params`](sylva_trees::DecisionTree::params)
    // Violates the convention that new should return a value of type `Self`
    #[allow(clippy::new_ret_no_self)]
    pub fn params() -> RandomForestParams {
        RandomForestParams::new()
    }
}

impl ParamGuard for RandomForestParams {
    type Checked = RandomForestValidParams;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.tree_count < 1 {
            Err(Error::Parameters(
                "Tree count should be at least one".to_string(),
            ))
        } else if !(self.0.row_sampling_fraction > 0.0 && self.0.row_sampling_fraction <= 1.0) {
            Err(Error::Parameters(format!(
                "Row sampling fraction should be in (0, 1], but was {}",
                self.0.row_sampling_fraction
            )))
        } else {
            self.0.tree_params.check_ref()?;
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
