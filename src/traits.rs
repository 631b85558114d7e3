//! Provide traits for different classes of algorithms
//!

use crate::error::Error;

/// Fittable algorithms
///
/// A fittable algorithm takes a dataset and creates a concept of some kind about it. For example
/// a decision tree learner takes training data and grows a tree which can be used to predict the
/// target of unseen records.
pub trait Fit<D, E: std::error::Error + From<Error>> {
    type Object;

    fn fit(&self, dataset: &D) -> Result<Self::Object, E>;
}

/// Predict with a fitted model
///
/// The record type `R` is usually a row of a table or a whole table, the output type `T` a
/// single prediction or a table of predictions.
pub trait Predict<R, T> {
    fn predict(&self, x: R) -> T;
}
