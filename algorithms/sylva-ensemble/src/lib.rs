//!
//! # Ensemble Learning Algorithms
//!
//! `sylva-ensemble` grows random forests of the trees in `sylva-trees`.
//!
//! # The big picture
//!
//! `sylva-ensemble` is a crate in the `sylva` family. A random forest trains many trees on the
//! same columnar store, every tree on its own row sample and with its own attribute subsets,
//! and combines their leaves into a single prediction.
//!
//! # Current state
//!
//! `sylva-ensemble` currently provides
//! * [random forests](RandomForest) for classification and regression, trained in parallel and
//!   cancellable through a [`CancelToken`](sylva::cancel::CancelToken)
//! * [hard and soft voting](VotingMethod), averaging with variance for regression
//! * [out-of-bag estimates](OobEstimate) of the prediction quality
//! * [table predictions](PredictorOptions) with confidence, model count and variance columns
//!
//! ## Example
//!
//! ```
//! use sylva::prelude::*;
//! use sylva_ensemble::{RandomForest, VotingMethod};
//! use sylva_trees::TreeDataBuilder;
//!
//! let mut table = DataTable::new(vec![
//!     ColumnSpec::numeric("x"),
//!     ColumnSpec::nominal("color"),
//!     ColumnSpec::nominal("class"),
//! ]);
//! for i in 0..50 {
//!     let color = if i % 3 == 0 { "red" } else { "blue" };
//!     let class = if i < 25 || color == "red" { "a" } else { "b" };
//!     table.push_row(
//!         format!("Row{}", i),
//!         vec![Cell::Numeric(i as f64), color.into(), class.into()],
//!     )?;
//! }
//! let data = TreeDataBuilder::new("class").build(&table)?;
//!
//! let forest = RandomForest::params()
//!     .tree_count(20)
//!     .attribute_sample_size(AttributeSampleSize::All)
//!     .random_seed(42)
//!     .fit(&data)?;
//!
//! let oob = forest.oob_estimate(&data, VotingMethod::Hard)?;
//! assert!(oob.accuracy().unwrap() > 0.8);
//! # Ok::<(), sylva::error::Error>(())
//! ```

mod algorithm;
mod hyperparams;
mod model;
mod oob;
mod predictor;
mod voting;

pub use hyperparams::*;
pub use model::*;
pub use oob::*;
pub use predictor::*;
pub use voting::*;

pub use sylva::error::Result;
