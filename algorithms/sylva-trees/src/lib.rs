//!
//! # Decision tree learning
//! `sylva-trees` grows decision and regression trees on typed tabular data.
//!
//! # The big picture
//!
//! `sylva-trees` is a crate in the `sylva` family. The core crate provides the tabular data
//! source, row and attribute sampling and the shared error type, `sylva-ensemble` assembles trees
//! of this crate into random forests.
//!
//! Training data is ingested once into a column-major [store](TreeData): numeric columns are
//! presorted, nominal columns keep one row bitset per category and every position of a vector
//! column becomes an attribute of its own. Trees are grown on the rows of a
//! [sample](sylva::sample::RowSample) of that store, so that many trees can share it.
//!
//! # Current state
//!
//! `sylva-trees` currently provides
//! * binary splits of numeric attributes and vector positions (thresholds), nominal attributes
//!   (category partitions) and bit vector positions (presence)
//! * Gini, information gain and information gain ratio criteria for classification and the
//!   squared error for regression
//! * missing values routed to the better child of every split
//! * attribute sampling per tree or per node
//!

mod decision_trees;

// Re-export all core decision tree functionality
pub use decision_trees::*;

// Re-export the common Result alias for convenience
pub use sylva::error::Result;
