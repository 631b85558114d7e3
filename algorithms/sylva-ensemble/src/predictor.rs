//! Predicting whole tables
//!
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, instrument};

use sylva::{
    dataset::{Cell, ColumnSpec, DataTable, Table},
    error::{Error, Result},
    traits::Predict,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use sylva_trees::TreeData;

use crate::model::RandomForest;
use crate::voting::{Votes, VotingMethod};

/// Which columns a table prediction appends to the input columns
///
/// Column names default to `Prediction (<target>)` for the prediction and
/// `P (<target>=<class>)` for the class confidences.
///
/// ### Example
///
/// ```rust
/// use sylva::prelude::*;
/// use sylva_ensemble::{PredictorOptions, RandomForest, VotingMethod};
/// use sylva_trees::TreeDataBuilder;
///
/// let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")]);
/// for i in 0..20 {
///     let class = if i < 10 { "low" } else { "high" };
///     table.push_row(format!("r{}", i), vec![Cell::Numeric(i as f64), class.into()])?;
/// }
/// let data = TreeDataBuilder::new("class").build(&table)?;
/// let forest = RandomForest::params().tree_count(5).random_seed(3).fit(&data)?;
///
/// let options = PredictorOptions::default()
///     .voting(VotingMethod::Soft)
///     .class_confidences(true)
///     .model_count(true);
/// let output = forest.predict_table(&table, &options)?;
///
/// let names: Vec<&str> = output.columns().iter().map(|c| c.name()).collect();
/// assert_eq!(
///     names,
///     vec!["x", "class", "Prediction (class)", "P (class=low)", "P (class=high)", "Model count"]
/// );
/// # Ok::<(), sylva::error::Error>(())
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct PredictorOptions {
    voting: VotingMethod,
    prediction_column: Option<String>,
    class_confidences: bool,
    confidence_prefix: Option<String>,
    confidence_suffix: String,
    overall_confidence: bool,
    model_count: bool,
    variance: bool,
}

impl Default for PredictorOptions {
    fn default() -> Self {
        PredictorOptions {
            voting: VotingMethod::Hard,
            prediction_column: None,
            class_confidences: false,
            confidence_prefix: None,
            confidence_suffix: ")".to_string(),
            overall_confidence: false,
            model_count: false,
            variance: false,
        }
    }
}

impl PredictorOptions {
    pub fn voting(mut self, voting: VotingMethod) -> Self {
        self.voting = voting;
        self
    }

    /// Name of the prediction column
    pub fn prediction_column(mut self, name: impl Into<String>) -> Self {
        self.prediction_column = Some(name.into());
        self
    }

    /// Appends one confidence column per class
    pub fn class_confidences(mut self, class_confidences: bool) -> Self {
        self.class_confidences = class_confidences;
        self
    }

    /// Class confidence columns are named `prefix + class + suffix`
    pub fn confidence_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.confidence_prefix = Some(prefix.into());
        self.confidence_suffix = suffix.into();
        self
    }

    /// Appends the confidence of the predicted class
    pub fn overall_confidence(mut self, overall_confidence: bool) -> Self {
        self.overall_confidence = overall_confidence;
        self
    }

    /// Appends the number of trees that voted
    pub fn model_count(mut self, model_count: bool) -> Self {
        self.model_count = model_count;
        self
    }

    /// Appends the variance of the tree predictions, regression only
    pub fn variance(mut self, variance: bool) -> Self {
        self.variance = variance;
        self
    }

    pub fn voting_method(&self) -> VotingMethod {
        self.voting
    }

    fn appended_columns(&self, target: &str, classes: &[String]) -> Vec<ColumnSpec> {
        let classification = !classes.is_empty();
        let prediction = self
            .prediction_column
            .clone()
            .unwrap_or_else(|| format!("Prediction ({})", target));

        let mut columns = vec![if classification {
            ColumnSpec::nominal(prediction).with_possible_values(classes.iter())
        } else {
            ColumnSpec::numeric(prediction)
        }];
        if classification && self.class_confidences {
            let prefix = self
                .confidence_prefix
                .clone()
                .unwrap_or_else(|| format!("P ({}=", target));
            columns.extend(classes.iter().map(|class| {
                ColumnSpec::numeric(format!("{}{}{}", prefix, class, self.confidence_suffix))
            }));
        }
        if classification && self.overall_confidence {
            columns.push(ColumnSpec::numeric("Confidence"));
        }
        if self.model_count {
            columns.push(ColumnSpec::numeric("Model count"));
        }
        if !classification && self.variance {
            columns.push(ColumnSpec::numeric("Prediction variance"));
        }
        columns
    }

    fn appended_cells(&self, votes: &Votes, classes: &[String]) -> Vec<Cell> {
        let mut cells = Vec::new();
        match votes {
            Votes::Classification(votes) => {
                cells.push(Cell::from(
                    votes.winner().map(|class| classes[class].clone()),
                ));
                if self.class_confidences {
                    if votes.n_models() > 0 {
                        cells.extend(votes.confidences().into_iter().map(Cell::Numeric));
                    } else {
                        cells.extend(classes.iter().map(|_| Cell::Missing));
                    }
                }
                if self.overall_confidence {
                    cells.push(Cell::from(votes.confidence()));
                }
            }
            Votes::Regression(votes) => cells.push(Cell::from(votes.mean())),
        }
        if self.model_count {
            cells.push(Cell::Numeric(votes.n_models() as f64));
        }
        if let Votes::Regression(votes) = votes {
            if self.variance {
                cells.push(Cell::from(votes.variance()));
            }
        }
        cells
    }
}

impl RandomForest {
    /// Votes of every tree for every row of a table, rows are processed in parallel
    ///
    /// Attributes whose column is absent from the table are missing.
    pub fn vote_table<T: Table + Sync>(&self, table: &T, method: VotingMethod) -> Result<Vec<Votes>> {
        let schema = self.schema();
        let binding = schema.bind(table);
        debug!(
            bound = binding.n_bound(),
            attributes = schema.n_attributes(),
            "bound prediction table"
        );

        (0..table.nrows())
            .into_par_iter()
            .map(|row| {
                binding
                    .record(schema, table, row)
                    .map(|record| self.vote(&record, method))
            })
            .collect()
    }

    /// The input table with the prediction columns configured in `options` appended
    ///
    /// Fails with `Error::Parameters` if an appended column name is already taken.
    #[instrument(skip_all, fields(rows = table.nrows()))]
    pub fn predict_table<T: Table + Sync>(
        &self,
        table: &T,
        options: &PredictorOptions,
    ) -> Result<DataTable> {
        let schema = self.schema();
        let classes = schema.classes();
        let appended = options.appended_columns(schema.target().name(), classes);
        if let Some(taken) = appended
            .iter()
            .find(|c| table.column_index(c.name()).is_some())
        {
            return Err(Error::Parameters(format!(
                "output column `{}` already exists",
                taken.name()
            )));
        }

        let votes = self.vote_table(table, options.voting)?;

        let mut columns = table.columns().to_vec();
        columns.extend(appended);
        let mut output = DataTable::new(columns);
        for (row, votes) in votes.iter().enumerate() {
            let mut cells: Vec<Cell> = (0..table.ncols())
                .map(|column| table.cell(row, column).clone())
                .collect();
            cells.extend(options.appended_cells(votes, classes));
            output.push_row(table.row_key(row), cells)?;
        }
        Ok(output)
    }

    /// Out-of-bag predictions of the training data, in the columns configured in `options`
    ///
    /// Every training row is voted on only by the trees whose sample does not contain it. The
    /// rows keep their keys. Rows which were in-bag for every tree get a missing prediction and a
    /// model count of zero.
    #[instrument(skip_all, fields(rows = data.nrows()))]
    pub fn oob_predict_table(&self, data: &TreeData, options: &PredictorOptions) -> Result<DataTable> {
        let schema = self.schema();
        let classes = schema.classes();
        let votes = self.oob_estimate(data, options.voting)?.into_votes();

        let mut output = DataTable::new(options.appended_columns(schema.target().name(), classes));
        for (row, votes) in votes.iter().enumerate() {
            output.push_row(data.row_key(row), options.appended_cells(votes, classes))?;
        }
        Ok(output)
    }

    /// Soft voted class probabilities with dimensionality (nrows, n_classes)
    ///
    /// Fails with `Error::Parameters` for a regression forest.
    pub fn predict_proba<T: Table + Sync>(&self, table: &T) -> Result<Array2<f64>> {
        let n_classes = self.schema().n_classes();
        if n_classes == 0 {
            return Err(Error::Parameters(
                "class probabilities need a nominal target".to_string(),
            ));
        }

        let votes = self.vote_table(table, VotingMethod::Soft)?;
        let flat: Vec<f64> = votes
            .iter()
            .flat_map(|v| {
                v.class_votes()
                    .map(|v| v.confidences())
                    .unwrap_or_else(|| vec![0.0; n_classes])
            })
            .collect();
        Ok(Array2::from_shape_vec((votes.len(), n_classes), flat)?)
    }
}

/// Predicts with hard voting and appends only the prediction column
impl<T: Table + Sync> Predict<&T, Result<DataTable>> for RandomForest {
    fn predict(&self, table: &T) -> Result<DataTable> {
        self.predict_table(table, &PredictorOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sylva::prelude::*;
    use sylva_trees::TreeDataBuilder;

    fn table() -> Result<DataTable> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::numeric("y")]);
        for i in 0..30 {
            let x = i as f64;
            let y = if i < 15 { 1.0 } else { 5.0 };
            table.push_row(format!("Row{}", i), vec![Cell::Numeric(x), Cell::Numeric(y)])?;
        }
        Ok(table)
    }

    #[test]
    fn regression_columns() -> Result<()> {
        let table = table()?;
        let data = TreeDataBuilder::new("y").build(&table)?;
        let forest = RandomForest::params().tree_count(10).random_seed(2).fit(&data)?;

        let options = PredictorOptions::default()
            .prediction_column("guess")
            .class_confidences(true)
            .model_count(true)
            .variance(true);
        let output = forest.predict_table(&table, &options)?;

        let names: Vec<&str> = output.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["x", "y", "guess", "Model count", "Prediction variance"]);
        assert_eq!(output.row_key(3), "Row3");
        assert_eq!(output.cell(0, 3), &Cell::Numeric(10.0));
        match (output.cell(0, 2), output.cell(0, 4)) {
            (Cell::Numeric(mean), Cell::Numeric(variance)) => {
                assert_abs_diff_eq!(*mean, 1.0, epsilon = 1e-9);
                assert_abs_diff_eq!(*variance, 0.0, epsilon = 1e-9);
            }
            cells => panic!("unexpected cells {:?}", cells),
        }
        Ok(())
    }

    #[test]
    fn out_of_bag_table_matches_votes() -> Result<()> {
        let table = table()?;
        let data = TreeDataBuilder::new("y").build(&table)?;
        let forest = RandomForest::params().tree_count(10).random_seed(4).fit(&data)?;

        let options = PredictorOptions::default().model_count(true).variance(true);
        let output = forest.oob_predict_table(&data, &options)?;
        let estimate = forest.oob_estimate(&data, VotingMethod::Hard)?;

        let names: Vec<&str> = output.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Prediction (y)", "Model count", "Prediction variance"]);
        assert_eq!(output.nrows(), data.nrows());
        for (row, votes) in estimate.votes().iter().enumerate() {
            assert_eq!(output.row_key(row), data.row_key(row));
            assert_eq!(output.cell(row, 1), &Cell::Numeric(votes.n_models() as f64));
            let mean = votes.regression_votes().and_then(|v| v.mean());
            assert_eq!(output.cell(row, 0), &Cell::from(mean));
        }
        Ok(())
    }

    #[test]
    fn rows_in_every_sample_have_no_out_of_bag_prediction() -> Result<()> {
        let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")]);
        for i in 0..20 {
            let class = if i < 10 { "low" } else { "high" };
            table.push_row(format!("Row{}", i), vec![Cell::Numeric(i as f64), class.into()])?;
        }
        let data = TreeDataBuilder::new("class").build(&table)?;
        // sampling without replacement at fraction one puts every row in every sample
        let forest = RandomForest::params()
            .tree_count(4)
            .row_sampling_with_replacement(false)
            .random_seed(1)
            .fit(&data)?;

        let options = PredictorOptions::default()
            .class_confidences(true)
            .overall_confidence(true)
            .model_count(true);
        let output = forest.oob_predict_table(&data, &options)?;

        let names: Vec<&str> = output.columns().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "Prediction (class)",
                "P (class=low)",
                "P (class=high)",
                "Confidence",
                "Model count"
            ]
        );
        for row in 0..output.nrows() {
            assert_eq!(
                output.row(row),
                &[
                    Cell::Missing,
                    Cell::Missing,
                    Cell::Missing,
                    Cell::Missing,
                    Cell::Numeric(0.0)
                ]
            );
        }
        Ok(())
    }

    #[test]
    fn taken_column_names_are_rejected() -> Result<()> {
        let table = table()?;
        let data = TreeDataBuilder::new("y").build(&table)?;
        let forest = RandomForest::params().tree_count(2).random_seed(2).fit(&data)?;

        let options = PredictorOptions::default().prediction_column("x");
        assert!(matches!(
            forest.predict_table(&table, &options),
            Err(Error::Parameters(_))
        ));
        assert!(forest.predict_proba(&table).is_err());
        Ok(())
    }
}
