#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::split::{Direction, Split};
use super::stats::NodeStats;

/// Position of a node in the arena of its tree, the root is at index 0
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    pub const ROOT: NodeIndex = NodeIndex(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A node in the decision tree
///
/// Both variants keep the target statistics of the in-sample rows that reached the node.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        stats: NodeStats,
        /// Distinct training rows of the node in ascending order
        rows: Vec<usize>,
        depth: usize,
    },
    Internal {
        split: Split,
        left: NodeIndex,
        right: NodeIndex,
        stats: NodeStats,
        depth: usize,
    },
}

impl TreeNode {
    /// Returns true if the node has no children
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn stats(&self) -> &NodeStats {
        match self {
            TreeNode::Leaf { stats, .. } | TreeNode::Internal { stats, .. } => stats,
        }
    }

    /// Returns the depth of the node in the decision tree, the root has depth 0
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { depth, .. } | TreeNode::Internal { depth, .. } => *depth,
        }
    }

    /// Training rows of a leaf, `None` for internal nodes
    pub fn rows(&self) -> Option<&[usize]> {
        match self {
            TreeNode::Leaf { rows, .. } => Some(rows),
            TreeNode::Internal { .. } => None,
        }
    }

    /// Split of an internal node
    pub fn split(&self) -> Option<&Split> {
        match self {
            TreeNode::Internal { split, .. } => Some(split),
            TreeNode::Leaf { .. } => None,
        }
    }

    /// Returns both children, first left then right
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match self {
            TreeNode::Internal { left, right, .. } => Some((*left, *right)),
            TreeNode::Leaf { .. } => None,
        }
    }

    pub fn child(&self, direction: Direction) -> Option<NodeIndex> {
        self.children().map(|(left, right)| match direction {
            Direction::Left => left,
            Direction::Right => right,
        })
    }

    /// Class id with the highest weight, ties go to the lowest id
    pub fn majority_class(&self) -> Option<usize> {
        self.stats().majority_class()
    }

    pub fn class_probabilities(&self) -> Vec<f64> {
        self.stats().class_probabilities()
    }

    /// Mean target of a regression node
    pub fn mean(&self) -> Option<f64> {
        self.stats().mean()
    }
}
