//! Combining the leaves reached in several trees into one prediction
//!
//! Every tree contributes the leaf a record reaches. Contributions are folded with `combine`,
//! which is associative, so partial results of disjoint tree subsets can be merged in any order.
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use sylva_trees::TreeNode;

/// How the leaves of a classification forest are combined
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VotingMethod {
    /// Every tree votes for the majority class of its leaf
    Hard,
    /// Every tree contributes the class distribution of its leaf
    Soft,
}

impl Default for VotingMethod {
    fn default() -> Self {
        VotingMethod::Hard
    }
}

/// Accumulated class votes of a number of trees
#[derive(Clone, Debug, PartialEq)]
pub struct ClassVotes {
    votes: Vec<f64>,
    n_models: usize,
}

impl ClassVotes {
    /// No votes over `n_classes` classes
    pub fn empty(n_classes: usize) -> Self {
        ClassVotes {
            votes: vec![0.0; n_classes],
            n_models: 0,
        }
    }

    /// A single tree voting for `class`
    pub fn from_class(class: usize, n_classes: usize) -> Self {
        let mut votes = Self::empty(n_classes);
        votes.votes[class] = 1.0;
        votes.n_models = 1;
        votes
    }

    /// A single tree contributing a class distribution
    pub fn from_probabilities(probabilities: &[f64]) -> Self {
        ClassVotes {
            votes: probabilities.to_vec(),
            n_models: 1,
        }
    }

    /// The vote of a single leaf
    pub fn of_leaf(leaf: &TreeNode, method: VotingMethod, n_classes: usize) -> Self {
        match method {
            VotingMethod::Hard => match leaf.majority_class() {
                Some(class) => Self::from_class(class, n_classes),
                None => Self::empty(n_classes),
            },
            VotingMethod::Soft => Self::from_probabilities(&leaf.class_probabilities()),
        }
    }

    pub fn combine(mut self, other: ClassVotes) -> ClassVotes {
        assert_eq!(
            self.votes.len(),
            other.votes.len(),
            "votes over different class lists"
        );
        self.votes
            .iter_mut()
            .zip(&other.votes)
            .for_each(|(mine, theirs)| *mine += theirs);
        self.n_models += other.n_models;
        self
    }

    /// Number of trees that voted
    pub fn n_models(&self) -> usize {
        self.n_models
    }

    /// Vote count (hard) or summed probability (soft) per class
    pub fn votes(&self) -> &[f64] {
        &self.votes
    }

    /// Class with the most votes, ties go to the lowest class id. `None` without votes.
    pub fn winner(&self) -> Option<usize> {
        if self.n_models == 0 {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (class, &v) in self.votes.iter().enumerate() {
            if best.map(|(_, b)| v > b).unwrap_or(true) {
                best = Some((class, v));
            }
        }
        best.map(|(class, _)| class)
    }

    /// Votes divided by the number of trees that voted, all zero without votes
    pub fn confidences(&self) -> Vec<f64> {
        let n = self.n_models as f64;
        self.votes
            .iter()
            .map(|&v| if self.n_models > 0 { v / n } else { 0.0 })
            .collect()
    }

    /// Confidence of the winning class
    pub fn confidence(&self) -> Option<f64> {
        self.winner()
            .map(|class| self.votes[class] / self.n_models as f64)
    }
}

/// Running mean and variance of the leaf means of a number of trees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegressionVotes {
    n_models: usize,
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

impl RegressionVotes {
    pub fn empty() -> Self {
        RegressionVotes {
            n_models: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// A single tree predicting `value`
    pub fn of_value(value: f64) -> Self {
        RegressionVotes {
            n_models: 1,
            mean: value,
            m2: 0.0,
        }
    }

    pub fn of_leaf(leaf: &TreeNode) -> Self {
        leaf.mean().map(Self::of_value).unwrap_or_else(Self::empty)
    }

    /// Merges two partial results with the pairwise update of Chan et al.
    pub fn combine(self, other: RegressionVotes) -> RegressionVotes {
        if self.n_models == 0 {
            return other;
        }
        if other.n_models == 0 {
            return self;
        }
        let n_a = self.n_models as f64;
        let n_b = other.n_models as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;

        RegressionVotes {
            n_models: self.n_models + other.n_models,
            mean: self.mean + delta * n_b / n,
            m2: self.m2 + other.m2 + delta * delta * n_a * n_b / n,
        }
    }

    pub fn n_models(&self) -> usize {
        self.n_models
    }

    /// Mean of the leaf means, `None` without votes
    pub fn mean(&self) -> Option<f64> {
        if self.n_models > 0 {
            Some(self.mean)
        } else {
            None
        }
    }

    /// Sample variance of the leaf means, zero for a single tree and `None` without votes
    pub fn variance(&self) -> Option<f64> {
        match self.n_models {
            0 => None,
            1 => Some(0.0),
            n => Some(self.m2 / (n - 1) as f64),
        }
    }
}

impl Default for RegressionVotes {
    fn default() -> Self {
        Self::empty()
    }
}

/// The combined prediction of a number of trees for one record
#[derive(Clone, Debug, PartialEq)]
pub enum Votes {
    Classification(ClassVotes),
    Regression(RegressionVotes),
}

impl Votes {
    /// No votes, for `n_classes` classes or regression if zero
    pub fn empty(n_classes: usize) -> Self {
        if n_classes > 0 {
            Votes::Classification(ClassVotes::empty(n_classes))
        } else {
            Votes::Regression(RegressionVotes::empty())
        }
    }

    pub fn of_leaf(leaf: &TreeNode, method: VotingMethod, n_classes: usize) -> Self {
        if n_classes > 0 {
            Votes::Classification(ClassVotes::of_leaf(leaf, method, n_classes))
        } else {
            Votes::Regression(RegressionVotes::of_leaf(leaf))
        }
    }

    /// ### Panics
    ///
    /// If a classification is combined with a regression
    pub fn combine(self, other: Votes) -> Votes {
        match (self, other) {
            (Votes::Classification(a), Votes::Classification(b)) => {
                Votes::Classification(a.combine(b))
            }
            (Votes::Regression(a), Votes::Regression(b)) => Votes::Regression(a.combine(b)),
            _ => panic!("classification and regression votes cannot be combined"),
        }
    }

    pub fn n_models(&self) -> usize {
        match self {
            Votes::Classification(votes) => votes.n_models(),
            Votes::Regression(votes) => votes.n_models(),
        }
    }

    pub fn class_votes(&self) -> Option<&ClassVotes> {
        match self {
            Votes::Classification(votes) => Some(votes),
            Votes::Regression(_) => None,
        }
    }

    pub fn regression_votes(&self) -> Option<&RegressionVotes> {
        match self {
            Votes::Regression(votes) => Some(votes),
            Votes::Classification(_) => None,
        }
    }
}
