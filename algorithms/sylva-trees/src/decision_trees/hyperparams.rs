use sylva::{
    error::{Error, Result},
    sample::{AttributeSampleMode, AttributeSampleSize},
    ParamGuard,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::DecisionTree;

/// The metric used to determine the attribute by which a node is split
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Measures the degree of probability of a randomly chosen row in the node being misclassified,
    /// defined as one minus the sum over all classes of the squared class probability.
    Gini,
    /// Decrease of the entropy (in bits) of the class distribution
    InformationGain,
    /// Information gain divided by the entropy of the partition itself, which penalizes
    /// splits producing a very unbalanced partition
    InformationGainRatio,
    /// Decrease of the sum of squared deviations from the mean, the only criterion for numeric targets
    SquaredError,
}

impl SplitCriterion {
    pub fn is_classification(&self) -> bool {
        !matches!(self, SplitCriterion::SquaredError)
    }
}

/// How rows with a missing value for the split attribute are routed
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingValueStrategy {
    /// Every candidate split is evaluated with the missing rows on the left and on the right
    AlwaysSearchBothDirections,
    /// The best split is searched without the missing rows, which are then sent to the side
    /// giving the higher gain
    AfterBestSplit,
}

/// Where the threshold of a numeric split is placed between two adjacent distinct values
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdConvention {
    /// Halfway between the values
    Midpoint,
    /// At the lower value
    LeftValue,
}

impl ThresholdConvention {
    /// Threshold separating `lower` from `upper`, always `>= lower` and `< upper`
    pub fn threshold(&self, lower: f64, upper: f64) -> f64 {
        match self {
            ThresholdConvention::Midpoint => {
                let mid = lower + (upper - lower) / 2.0;
                // adjacent floats have no value in between
                if mid < upper {
                    mid
                } else {
                    lower
                }
            }
            ThresholdConvention::LeftValue => lower,
        }
    }
}

/// The set of hyperparameters that can be specified for growing a
/// [decision tree](struct.DecisionTree.html).
///
/// ### Example
///
/// ```rust
/// use sylva::prelude::*;
/// use sylva_trees::{DecisionTree, SplitCriterion, TreeDataBuilder};
///
/// let table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")])
///     .with_row("r0", vec![Cell::Numeric(1.0), "a".into()])?
///     .with_row("r1", vec![Cell::Numeric(2.0), "a".into()])?
///     .with_row("r2", vec![Cell::Numeric(3.0), "b".into()])?
///     .with_row("r3", vec![Cell::Numeric(4.0), "b".into()])?;
/// let data = TreeDataBuilder::new("class").build(&table)?;
///
/// // Initialize the default set of parameters and set them to the desired values
/// let params = DecisionTree::params()
///     .split_criterion(SplitCriterion::InformationGain)
///     .max_depth(Some(5))
///     .min_child_node_size(1.0);
///
/// let tree = params.fit(&data)?;
/// assert_eq!(tree.num_leaves(), 2);
/// # Ok::<(), sylva::error::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTreeValidParams {
    split_criterion: Option<SplitCriterion>,
    max_depth: Option<usize>,
    min_split_node_size: f64,
    min_child_node_size: f64,
    attribute_sample_size: AttributeSampleSize,
    attribute_sample_mode: AttributeSampleMode,
    always_include_attribute: Option<String>,
    use_binary_nominal_splits: bool,
    missing_value_strategy: MissingValueStrategy,
    threshold_convention: ThresholdConvention,
    random_seed: u64,
}

impl DecisionTreeValidParams {
    /// The configured criterion, `None` picks the default for the target kind
    pub fn split_criterion(&self) -> Option<SplitCriterion> {
        self.split_criterion
    }

    /// The criterion used for a classification (`true`) or regression target
    pub fn resolve_criterion(&self, classification: bool) -> Result<SplitCriterion> {
        match self.split_criterion {
            None if classification => Ok(SplitCriterion::Gini),
            None => Ok(SplitCriterion::SquaredError),
            Some(c) if c.is_classification() == classification => Ok(c),
            Some(c) => Err(Error::Parameters(format!(
                "Split criterion {:?} cannot be used for a {} target",
                c,
                if classification { "nominal" } else { "numeric" }
            ))),
        }
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn min_split_node_size(&self) -> f64 {
        self.min_split_node_size
    }

    pub fn min_child_node_size(&self) -> f64 {
        self.min_child_node_size
    }

    pub fn attribute_sample_size(&self) -> AttributeSampleSize {
        self.attribute_sample_size
    }

    pub fn attribute_sample_mode(&self) -> AttributeSampleMode {
        self.attribute_sample_mode
    }

    pub fn always_include_attribute(&self) -> Option<&str> {
        self.always_include_attribute.as_deref()
    }

    pub fn use_binary_nominal_splits(&self) -> bool {
        self.use_binary_nominal_splits
    }

    pub fn missing_value_strategy(&self) -> MissingValueStrategy {
        self.missing_value_strategy
    }

    pub fn threshold_convention(&self) -> ThresholdConvention {
        self.threshold_convention
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTreeParams(DecisionTreeValidParams);

impl DecisionTreeParams {
    pub fn new() -> Self {
        Self(DecisionTreeValidParams {
            split_criterion: None,
            max_depth: None,
            min_split_node_size: 2.0,
            min_child_node_size: 1.0,
            attribute_sample_size: AttributeSampleSize::All,
            attribute_sample_mode: AttributeSampleMode::PerNode,
            always_include_attribute: None,
            use_binary_nominal_splits: true,
            missing_value_strategy: MissingValueStrategy::AlwaysSearchBothDirections,
            threshold_convention: ThresholdConvention::Midpoint,
            random_seed: 42,
        })
    }

    /// Sets the metric used to decide the attribute on which to split a node
    pub fn split_criterion(mut self, split_criterion: SplitCriterion) -> Self {
        self.0.split_criterion = Some(split_criterion);
        self
    }

    /// Sets the optional limit to the depth of the decision tree, the root is at depth 0
    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.0.max_depth = max_depth;
        self
    }

    /// Sets the minimum weight of rows required to split a node
    pub fn min_split_node_size(mut self, min_split_node_size: f64) -> Self {
        self.0.min_split_node_size = min_split_node_size;
        self
    }

    /// Sets the minimum weight of rows that a split has to place in each child
    pub fn min_child_node_size(mut self, min_child_node_size: f64) -> Self {
        self.0.min_child_node_size = min_child_node_size;
        self
    }

    /// Sets the number of attributes considered for a split
    pub fn attribute_sample_size(mut self, attribute_sample_size: AttributeSampleSize) -> Self {
        self.0.attribute_sample_size = attribute_sample_size;
        self
    }

    /// Sets whether attribute subsets are drawn per node or once per tree
    pub fn attribute_sample_mode(mut self, attribute_sample_mode: AttributeSampleMode) -> Self {
        self.0.attribute_sample_mode = attribute_sample_mode;
        self
    }

    /// Names an attribute which is part of every attribute subset
    pub fn always_include_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.0.always_include_attribute = Some(attribute.into());
        self
    }

    /// Sets whether nominal attributes are split into two subsets of categories (`true`) or
    /// into one category against the rest
    pub fn use_binary_nominal_splits(mut self, use_binary_nominal_splits: bool) -> Self {
        self.0.use_binary_nominal_splits = use_binary_nominal_splits;
        self
    }

    pub fn missing_value_strategy(mut self, missing_value_strategy: MissingValueStrategy) -> Self {
        self.0.missing_value_strategy = missing_value_strategy;
        self
    }

    pub fn threshold_convention(mut self, threshold_convention: ThresholdConvention) -> Self {
        self.0.threshold_convention = threshold_convention;
        self
    }

    /// Seed of the attribute sampling when the tree is fitted directly
    pub fn random_seed(mut self, random_seed: u64) -> Self {
        self.0.random_seed = random_seed;
        self
    }
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Defaults are provided if the optional parameters are not specified:
    /// * `split_criterion = Gini` for nominal and `SquaredError` for numeric targets
    /// * `max_depth = None`
    /// * `min_split_node_size = 2.0`
    /// * `min_child_node_size = 1.0`
    /// * `attribute_sample_size = All`
    /// * `attribute_sample_mode = PerNode`
    /// * `always_include_attribute = None`
    /// * `use_binary_nominal_splits = true`
    /// * `missing_value_strategy = AlwaysSearchBothDirections`
    /// * `threshold_convention = Midpoint`
    /// * `random_seed = 42`
    // Violates the convention that new should return a value of type `Self`
    #[allow(clippy::new_ret_no_self)]
    pub fn params() -> DecisionTreeParams {
        DecisionTreeParams::new()
    }
}

impl ParamGuard for DecisionTreeParams {
    type Checked = DecisionTreeValidParams;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.max_depth == Some(0) {
            Err(Error::Parameters(
                "Maximal depth should be at least 1".to_string(),
            ))
        } else if !(self.0.min_split_node_size.is_finite() && self.0.min_split_node_size >= 0.0) {
            Err(Error::Parameters(format!(
                "Minimum split node size should be non-negative, but was {}",
                self.0.min_split_node_size
            )))
        } else if !(self.0.min_child_node_size.is_finite() && self.0.min_child_node_size > 0.0) {
            Err(Error::Parameters(format!(
                "Minimum child node size should be greater than zero, but was {}",
                self.0.min_child_node_size
            )))
        } else {
            self.0.attribute_sample_size.check()?;
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_follows_target_kind() -> Result<()> {
        let params = DecisionTree::params().check()?;
        assert_eq!(params.resolve_criterion(true)?, SplitCriterion::Gini);
        assert_eq!(params.resolve_criterion(false)?, SplitCriterion::SquaredError);

        let params = DecisionTree::params()
            .split_criterion(SplitCriterion::SquaredError)
            .check()?;
        assert!(params.resolve_criterion(true).is_err());
        Ok(())
    }

    #[test]
    fn midpoint_threshold_stays_below_upper_value() {
        assert_eq!(ThresholdConvention::Midpoint.threshold(1.0, 2.0), 1.5);
        assert_eq!(ThresholdConvention::LeftValue.threshold(1.0, 2.0), 1.0);

        let lower = 1.0f64;
        let upper = f64::from_bits(lower.to_bits() + 1);
        let t = ThresholdConvention::Midpoint.threshold(lower, upper);
        assert!(t >= lower && t < upper);
    }

    #[test]
    #[should_panic]
    fn panic_zero_child_node_size() {
        DecisionTree::params()
            .min_child_node_size(0.0)
            .check()
            .unwrap();
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(DecisionTree::params().max_depth(Some(0)).check().is_err());
        assert!(DecisionTree::params()
            .attribute_sample_size(AttributeSampleSize::Fraction(1.5))
            .check()
            .is_err());
        assert!(DecisionTree::params().min_split_node_size(f64::NAN).check().is_err());
    }
}
