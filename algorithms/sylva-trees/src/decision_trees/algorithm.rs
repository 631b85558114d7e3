//! Decision and regression trees over typed attributes
//!
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use sylva::{
    bitset::BitSet,
    cancel::CancelToken,
    dataset::{Cell, Table},
    error::{Error, Result},
    sample::{AttributeSampleMode, AttributeSampler, RowSample},
    traits::*,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::condition::Condition;
use super::data::TreeData;
use super::hyperparams::DecisionTreeValidParams;
use super::node::{NodeIndex, TreeNode};
use super::schema::{AttributeValues, Schema};
use super::split::{Direction, SplitSearch};
use super::statistics::SplitStatistics;
use super::stats::NodeStats;
use super::NodeIter;

/// A fitted decision tree for classification or regression.
///
/// ### Structure
/// A decision tree is a binary tree where:
/// * each internal node holds a [split](struct.Split.html) of a single attribute: a threshold for
///   numeric attributes and vector positions, a binary partition of the categories for nominal
///   attributes and the presence of a bit for bit vector positions. Missing values go to the child
///   recorded with the split.
/// * leaf nodes hold the target statistics of their training rows: weighted class counts for a
///   nominal target, weight, mean and sum of squared deviations for a numeric target
///
/// Nodes live in an arena, the root is at index 0 and every node precedes its descendants.
///
/// ### Algorithm
///
/// Starting with a single root node holding every row of the tree's sample, a node becomes a leaf
/// if its weight is below `min_split_node_size`, if it reached `max_depth` or if it is pure.
/// Otherwise a subset of the attributes is sampled, the best split over the subset is searched and
/// the rows are partitioned among the two children, which are grown in turn. A node without any
/// split of positive gain becomes a leaf.
///
/// ### Predictions
///
/// A record is routed from the root to a leaf. The leaf's majority class (the lowest class id on
/// ties) or mean target is the prediction.
///
/// ### Example
///
/// ```rust
/// use sylva::prelude::*;
/// use sylva_trees::{DecisionTree, TreeDataBuilder};
///
/// let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")]);
/// for i in 0..10 {
///     let class = if i < 5 { "low" } else { "high" };
///     table.push_row(format!("r{}", i), vec![Cell::Numeric(i as f64), class.into()])?;
/// }
/// let data = TreeDataBuilder::new("class").build(&table)?;
///
/// let tree = DecisionTree::params().fit(&data)?;
/// let predictions = tree.predict(&table)?;
///
/// assert_eq!(predictions[0], Cell::from("low"));
/// assert_eq!(predictions[9], Cell::from("high"));
/// # Ok::<(), sylva::error::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    schema: Arc<Schema>,
    attribute_subset: Option<Vec<usize>>,
    statistics: SplitStatistics,
}

impl DecisionTree {
    /// Create a node iterator in level-order (BFT)
    pub fn iter_nodes(&self) -> NodeIter<'_> {
        NodeIter::new(&self.nodes)
    }

    /// Nodes in growth (pre-)order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &TreeNode {
        &self.nodes[index.index()]
    }

    /// Return root node of the tree
    pub fn root_node(&self) -> &TreeNode {
        self.node(NodeIndex::ROOT)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Attributes the tree could choose from if they were sampled once per tree
    pub fn attribute_subset(&self) -> Option<&[usize]> {
        self.attribute_subset.as_deref()
    }

    /// Candidate and split counts per attribute and level
    pub fn statistics(&self) -> &SplitStatistics {
        &self.statistics
    }

    /// Leaf reached by a record
    pub fn leaf_index<V: AttributeValues + ?Sized>(&self, record: &V) -> NodeIndex {
        let mut index = NodeIndex::ROOT;
        loop {
            let node = &self.nodes[index.index()];
            let child = node
                .split()
                .and_then(|split| node.child(split.route(record.value(split.attribute()))));
            match child {
                Some(child) => index = child,
                None => return index,
            }
        }
    }

    pub fn leaf<V: AttributeValues + ?Sized>(&self, record: &V) -> &TreeNode {
        self.node(self.leaf_index(record))
    }

    /// Prediction of the leaf reached by a record
    ///
    /// The class value for a nominal target, the mean for a numeric target.
    pub fn predict_record<V: AttributeValues + ?Sized>(&self, record: &V) -> Cell {
        let leaf = self.leaf(record);
        if self.schema.is_classification() {
            leaf.majority_class()
                .and_then(|class| self.schema.classes().get(class))
                .map(|class| Cell::Nominal(class.clone()))
                .unwrap_or(Cell::Missing)
        } else {
            leaf.mean().map(Cell::Numeric).unwrap_or(Cell::Missing)
        }
    }

    /// Conditions under which a row reaches the left and right child of an internal node
    pub fn conditions(&self, index: NodeIndex) -> Option<(Condition, Condition)> {
        self.node(index)
            .split()
            .map(|split| Condition::of_split(split, &self.schema))
    }

    /// Return the impurity decrease of every attribute, normalized to sum up to one
    ///
    /// All zero if the tree is a single leaf.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.schema.n_attributes()];
        for split in self.nodes.iter().filter_map(|node| node.split()) {
            importance[split.attribute()] += split.gain();
        }

        let sum: f64 = importance.iter().sum();
        if sum > 0.0 {
            importance.iter_mut().for_each(|i| *i /= sum);
        }
        importance
    }

    /// Return max depth of the tree
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth()).max().unwrap_or(0)
    }

    /// Return the number of leaves in this tree
    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }
}

impl Fit<TreeData, Error> for DecisionTreeValidParams {
    type Object = DecisionTree;

    /// Grows a tree on every row of the training data, using `random_seed` for attribute sampling
    fn fit(&self, data: &TreeData) -> Result<Self::Object> {
        let mut rng = StdRng::seed_from_u64(self.random_seed());
        self.grow(data, &RowSample::all(data.nrows()), &mut rng, &CancelToken::new())
    }
}

impl DecisionTreeValidParams {
    /// Grows a tree on the rows of `sample`
    ///
    /// Rows drawn several times weigh as often as they were drawn. The cancel token is polled
    /// before every node expansion, a cancelled run fails with `Error::Cancelled`.
    #[instrument(skip_all, fields(rows = data.nrows(), sample = sample.len()))]
    pub fn grow<R: Rng + ?Sized>(
        &self,
        data: &TreeData,
        sample: &RowSample,
        rng: &mut R,
        cancel: &CancelToken,
    ) -> Result<DecisionTree> {
        if sample.row_count() != data.nrows() {
            return Err(Error::RowCountMismatch {
                expected: data.nrows(),
                found: sample.row_count(),
            });
        }
        if sample.is_empty() {
            return Err(Error::Parameters("row sample is empty".to_string()));
        }

        let schema = data.schema();
        let criterion = self.resolve_criterion(schema.is_classification())?;

        let always_include = match self.always_include_attribute() {
            Some(name) => Some(schema.attribute_index(name).ok_or_else(|| {
                Error::Parameters(format!("unknown attribute `{}` to always include", name))
            })?),
            None => None,
        };
        let all_attributes: Vec<usize> = (0..data.n_attributes()).collect();
        let k = self.attribute_sample_size().resolve(all_attributes.len());
        let sampler = AttributeSampler::new(k, always_include);

        let attribute_subset = match self.attribute_sample_mode() {
            AttributeSampleMode::PerTree => Some(sampler.sample(&all_attributes, rng)),
            AttributeSampleMode::PerNode => None,
        };

        let weights: Vec<f64> = (0..data.nrows()).map(|row| sample.count(row) as f64).collect();
        let mut grower = TreeGrower {
            search: SplitSearch {
                data,
                weights: &weights,
                criterion,
                min_child_node_size: self.min_child_node_size(),
                missing_value_strategy: self.missing_value_strategy(),
                threshold_convention: self.threshold_convention(),
                use_binary_nominal_splits: self.use_binary_nominal_splits(),
            },
            params: self,
            sampler,
            all_attributes: &all_attributes,
            attribute_subset,
            rng,
            cancel,
            mask: BitSet::new(data.nrows()),
            nodes: Vec::new(),
            statistics: SplitStatistics::new(
                schema.attributes().iter().map(|a| a.name().to_string()).collect(),
            ),
        };

        grower.grow_node(sample.in_bag_rows().collect(), 0)?;
        let TreeGrower {
            nodes,
            statistics,
            attribute_subset,
            ..
        } = grower;

        let tree = DecisionTree {
            nodes,
            schema: Arc::clone(schema),
            attribute_subset,
            statistics,
        };
        debug!(
            nodes = tree.nodes.len(),
            leaves = tree.num_leaves(),
            depth = tree.max_depth(),
            "grew decision tree"
        );

        Ok(tree)
    }
}

/// State of growing a single tree
struct TreeGrower<'a, R: Rng + ?Sized> {
    search: SplitSearch<'a>,
    params: &'a DecisionTreeValidParams,
    sampler: AttributeSampler,
    all_attributes: &'a [usize],
    attribute_subset: Option<Vec<usize>>,
    rng: &'a mut R,
    cancel: &'a CancelToken,
    /// Rows of the node being split, cleared again after every search
    mask: BitSet,
    nodes: Vec<TreeNode>,
    statistics: SplitStatistics,
}

impl<'a, R: Rng + ?Sized> TreeGrower<'a, R> {
    /// Grows the subtree of `rows` and returns the index of its root
    ///
    /// The node takes its index before its children, so the arena is in pre-order.
    fn grow_node(&mut self, rows: Vec<usize>, depth: usize) -> Result<NodeIndex> {
        self.cancel.check()?;

        let data = self.search.data;
        let stats = NodeStats::of_rows(data.target(), &rows, self.search.weights);
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(TreeNode::Leaf {
            stats: stats.clone(),
            rows: Vec::new(),
            depth,
        });

        let depth_reached = self
            .params
            .max_depth()
            .map(|max_depth| depth >= max_depth)
            .unwrap_or(false);
        if stats.weight() < self.params.min_split_node_size() || depth_reached || stats.is_pure() {
            return Ok(self.leaf(index, stats, rows, depth));
        }

        let candidates = match &self.attribute_subset {
            Some(subset) => subset.clone(),
            None => self.sampler.sample(self.all_attributes, &mut *self.rng),
        };
        self.statistics.record_candidates(&candidates, depth);

        rows.iter().for_each(|&row| self.mask.insert(row));
        let best = self
            .search
            .find_best_split(&rows, &self.mask, &candidates, &stats);
        rows.iter().for_each(|&row| self.mask.remove(row));
        let split = match best {
            Some(split) => split,
            None => return Ok(self.leaf(index, stats, rows, depth)),
        };

        let attribute = split.attribute();
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&row| split.route(data.value(attribute, row)) == Direction::Left);
        if left_rows.is_empty() || right_rows.is_empty() {
            return Ok(self.leaf(index, stats, rows, depth));
        }
        self.statistics.record_split(attribute, depth);

        let left = self.grow_node(left_rows, depth + 1)?;
        let right = self.grow_node(right_rows, depth + 1)?;
        self.nodes[index.index()] = TreeNode::Internal {
            split,
            left,
            right,
            stats,
            depth,
        };

        Ok(index)
    }

    fn leaf(&mut self, index: NodeIndex, stats: NodeStats, rows: Vec<usize>, depth: usize) -> NodeIndex {
        self.nodes[index.index()] = TreeNode::Leaf { stats, rows, depth };
        index
    }
}

/// Predicts every row of a table
///
/// Attributes are matched to the table's columns by name, absent columns count as missing.
/// Fails with `SchemaMismatch` if a column holds cells of another type than during training.
impl<T: Table> Predict<&T, Result<Vec<Cell>>> for DecisionTree {
    fn predict(&self, table: &T) -> Result<Vec<Cell>> {
        let binding = self.schema.bind(table);
        (0..table.nrows())
            .map(|row| {
                let record = binding.record(&self.schema, table, row)?;
                Ok(self.predict_record(&record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision_trees::data::TreeDataBuilder;
    use crate::decision_trees::hyperparams::SplitCriterion;
    use crate::DecisionTree;
    use approx::assert_abs_diff_eq;
    use sylva::dataset::{ColumnSpec, DataTable};
    use sylva::sample::AttributeSampleSize;
    use sylva::ParamGuard;

    /// `a = 1` is class z, otherwise `b` separates x from y
    fn three_class_table() -> Result<DataTable> {
        let mut table = DataTable::new(vec![
            ColumnSpec::numeric("a"),
            ColumnSpec::numeric("b"),
            ColumnSpec::nominal("class"),
        ]);
        for i in 0..40 {
            let a = (i % 2) as f64;
            let b = ((i / 2) % 2) as f64;
            let class = match (a > 0.5, b > 0.5) {
                (true, _) => "z",
                (false, false) => "x",
                (false, true) => "y",
            };
            table.push_row(format!("r{}", i), vec![Cell::Numeric(a), Cell::Numeric(b), class.into()])?;
        }
        Ok(table)
    }

    #[test]
    fn training_table_is_learned_exactly() -> Result<()> {
        let table = three_class_table()?;
        let data = TreeDataBuilder::new("class").build(&table)?;
        let tree = DecisionTree::params().fit(&data)?;

        let predictions = tree.predict(&table)?;
        for (row, prediction) in predictions.iter().enumerate() {
            assert_eq!(prediction, table.cell(row, 2));
        }
        assert_eq!(tree.num_leaves(), 3);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(tree.root_node().split().map(|s| s.attribute()), Some(0));
        Ok(())
    }

    #[test]
    fn nodes_are_in_pre_order() -> Result<()> {
        let data = TreeDataBuilder::new("class").build(&three_class_table()?)?;
        let tree = DecisionTree::params().fit(&data)?;

        for (i, node) in tree.nodes().iter().enumerate() {
            if let Some((left, right)) = node.children() {
                assert_eq!(left.index(), i + 1);
                assert!(right.index() > left.index());
                assert_eq!(tree.node(left).depth(), node.depth() + 1);
            }
        }
        assert_eq!(tree.iter_nodes().count(), tree.nodes().len());
        assert_eq!(tree.iter_nodes().next(), Some(tree.root_node()));
        Ok(())
    }

    #[test]
    fn max_depth_and_min_split_size_stop_growth() -> Result<()> {
        let data = TreeDataBuilder::new("class").build(&three_class_table()?)?;

        let stump = DecisionTree::params().max_depth(Some(1)).fit(&data)?;
        assert_eq!(stump.max_depth(), 1);
        assert!(stump.num_leaves() <= 2);

        let single_leaf = DecisionTree::params().min_split_node_size(100.0).fit(&data)?;
        assert_eq!(single_leaf.nodes().len(), 1);
        assert_eq!(single_leaf.feature_importance(), vec![0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn regression_leaves_hold_means() -> Result<()> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::numeric("y")]);
        for i in 0..20 {
            let y = if i < 10 { 1.0 } else { 5.0 };
            table.push_row(format!("r{}", i), vec![Cell::Numeric(i as f64), Cell::Numeric(y)])?;
        }
        let data = TreeDataBuilder::new("y").build(&table)?;
        let tree = DecisionTree::params().fit(&data)?;

        assert_eq!(tree.num_leaves(), 2);
        let predictions = tree.predict(&table)?;
        assert_eq!(predictions[3], Cell::Numeric(1.0));
        assert_eq!(predictions[15], Cell::Numeric(5.0));
        assert_abs_diff_eq!(tree.feature_importance()[0], 1.0);
        Ok(())
    }

    #[test]
    fn constant_target_with_large_offset_is_a_single_leaf() -> Result<()> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::numeric("y")]);
        for i in 0..500 {
            table.push_row(
                format!("r{}", i),
                vec![Cell::Numeric((i * 7 % 13) as f64), Cell::Numeric(1234567.891)],
            )?;
        }
        let data = TreeDataBuilder::new("y").build(&table)?;

        let tree = DecisionTree::params().fit(&data)?;
        assert_eq!(tree.nodes().len(), 1);
        assert!(tree.root_node().stats().is_pure());
        assert_eq!(tree.root_node().stats().sum_squared_error(), 0.0);
        assert_eq!(tree.predict(&table)?[0], Cell::Numeric(1234567.891));

        let sample = RowSample::create(data.nrows(), 1.0, true, 3)?;
        let params = DecisionTree::params().check()?;
        let bootstrapped = params.grow(&data, &sample, &mut StdRng::seed_from_u64(3), &CancelToken::new())?;
        assert_eq!(bootstrapped.num_leaves(), 1);
        Ok(())
    }

    #[test]
    fn bootstrap_counts_weigh_rows() -> Result<()> {
        let data = TreeDataBuilder::new("class").build(&three_class_table()?)?;
        let sample = RowSample::from_indices(data.nrows(), vec![0, 0, 0, 1, 5]);
        let params = DecisionTree::params().check()?;
        let tree = params.grow(&data, &sample, &mut StdRng::seed_from_u64(1), &CancelToken::new())?;

        assert_abs_diff_eq!(tree.root_node().stats().weight(), 5.0);
        let mut rows: Vec<usize> = tree
            .nodes()
            .iter()
            .filter_map(|node| node.rows())
            .flatten()
            .copied()
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 5]);
        Ok(())
    }

    #[test]
    fn per_tree_attribute_subset_is_recorded() -> Result<()> {
        let data = TreeDataBuilder::new("class").build(&three_class_table()?)?;
        let tree = DecisionTree::params()
            .attribute_sample_size(AttributeSampleSize::Absolute(1))
            .attribute_sample_mode(AttributeSampleMode::PerTree)
            .always_include_attribute("b")
            .fit(&data)?;

        assert_eq!(tree.attribute_subset(), Some(&[1][..]));
        assert!(tree
            .nodes()
            .iter()
            .filter_map(|node| node.split())
            .all(|split| split.attribute() == 1));
        assert_eq!(tree.statistics().candidates(0, 0), 0);
        assert_eq!(tree.statistics().candidates(1, 0), 1);
        Ok(())
    }

    #[test]
    fn configuration_errors() -> Result<()> {
        let data = TreeDataBuilder::new("class").build(&three_class_table()?)?;

        let unknown = DecisionTree::params().always_include_attribute("c").fit(&data);
        assert!(matches!(unknown, Err(Error::Parameters(_))));

        let wrong_criterion = DecisionTree::params()
            .split_criterion(SplitCriterion::SquaredError)
            .fit(&data);
        assert!(matches!(wrong_criterion, Err(Error::Parameters(_))));

        let params = DecisionTree::params().check()?;
        let cancel = CancelToken::new();
        cancel.cancel();
        let cancelled = params.grow(
            &data,
            &RowSample::all(data.nrows()),
            &mut StdRng::seed_from_u64(0),
            &cancel,
        );
        assert!(matches!(cancelled, Err(Error::Cancelled)));

        let short = params.grow(
            &data,
            &RowSample::all(3),
            &mut StdRng::seed_from_u64(0),
            &cancel,
        );
        assert!(matches!(short, Err(Error::RowCountMismatch { .. })));
        Ok(())
    }

    #[test]
    fn conditions_of_the_root() -> Result<()> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("col"), ColumnSpec::nominal("class")]);
        for (i, &v) in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
            let class = if v <= 3.0 { "a" } else { "b" };
            table.push_row(format!("r{}", i), vec![Cell::Numeric(v), class.into()])?;
        }
        let data = TreeDataBuilder::new("class").build(&table)?;
        let tree = DecisionTree::params()
            .threshold_convention(crate::ThresholdConvention::LeftValue)
            .fit(&data)?;

        let (left, right) = tree.conditions(NodeIndex::ROOT).expect("root is split");
        // no missing values, so they follow the heavier child (left on ties)
        assert_eq!(left.to_string(), "col <= 3 or missing");
        assert_eq!(right.to_string(), "col > 3");
        Ok(())
    }
}
