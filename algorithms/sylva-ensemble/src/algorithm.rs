//! Growing the trees of a random forest
//!
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use sylva::{
    cancel::CancelToken,
    error::{Error, Result},
    sample::RowSample,
    traits::*,
    ParamGuard,
};
use sylva_trees::{DecisionTreeValidParams, TreeData};

use crate::hyperparams::RandomForestValidParams;
use crate::model::{EnsembleBuilder, EnsembleMember, RandomForest};

impl Fit<TreeData, Error> for RandomForestValidParams {
    type Object = RandomForest;

    fn fit(&self, data: &TreeData) -> Result<Self::Object> {
        self.fit_with_cancel(data, &CancelToken::new())
    }
}

impl RandomForestValidParams {
    /// Grows the forest, polling `cancel` before every tree and every node expansion
    ///
    /// Trees finished before cancellation are kept and the forest is returned incomplete with an
    /// `IncompleteEnsemble` warning. If not a single tree finished the run fails with
    /// `Error::Cancelled`.
    #[instrument(skip_all, fields(rows = data.nrows(), trees = self.tree_count()))]
    pub fn fit_with_cancel(&self, data: &TreeData, cancel: &CancelToken) -> Result<RandomForest> {
        let tree_params = self.tree_params().check_ref()?;
        let schema = data.schema();
        tree_params.resolve_criterion(schema.is_classification())?;
        if let Some(name) = tree_params.always_include_attribute() {
            if schema.attribute_index(name).is_none() {
                return Err(Error::Parameters(format!(
                    "unknown attribute `{}` to always include",
                    name
                )));
            }
        }

        let strata: Option<Vec<usize>> = if self.stratified_sampling() {
            data.target()
                .class_codes()
                .map(|codes| codes.iter().map(|&c| c as usize).collect())
        } else {
            None
        };

        // per-tree seeds are fixed before any tree is scheduled
        let master_seed = self
            .random_seed()
            .unwrap_or_else(|| rand::thread_rng().gen());
        let mut master_rng = StdRng::seed_from_u64(master_seed);
        let seeds: Vec<u64> = (0..self.tree_count()).map(|_| master_rng.gen()).collect();

        let results: Vec<Result<EnsembleMember>> = seeds
            .into_par_iter()
            .enumerate()
            .map(|(index, seed)| {
                let member = self.grow_member(tree_params, data, strata.as_deref(), seed, cancel);
                if let Ok(member) = &member {
                    debug!(
                        tree = index,
                        nodes = member.tree().nodes().len(),
                        depth = member.tree().max_depth(),
                        "tree finished"
                    );
                }
                member
            })
            .collect();

        let mut builder = EnsembleBuilder::new(Arc::clone(schema), self.tree_count());
        for result in results {
            match result {
                Ok(member) => builder.add_tree(member)?,
                Err(Error::Cancelled) => {}
                Err(err) => return Err(err),
            }
        }
        if builder.n_trees() == 0 {
            return Err(Error::Cancelled);
        }

        let forest = builder.finalize()?;
        info!(
            trees = forest.n_trees(),
            requested = forest.requested_trees(),
            seed = master_seed,
            "random forest trained"
        );
        Ok(forest)
    }

    fn grow_member(
        &self,
        tree_params: &DecisionTreeValidParams,
        data: &TreeData,
        strata: Option<&[usize]>,
        seed: u64,
        cancel: &CancelToken,
    ) -> Result<EnsembleMember> {
        cancel.check()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let sample = match strata {
            Some(strata) => RowSample::draw_stratified(
                strata,
                self.row_sampling_fraction(),
                self.row_sampling_with_replacement(),
                &mut rng,
            )?,
            None => RowSample::draw(
                data.nrows(),
                self.row_sampling_fraction(),
                self.row_sampling_with_replacement(),
                &mut rng,
            )?,
        };
        let tree = tree_params.grow(data, &sample, &mut rng, cancel)?;

        let sample = if self.store_row_samples() {
            Some(sample)
        } else {
            None
        };
        Ok(EnsembleMember::new(tree, sample, seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva::prelude::*;
    use sylva_trees::TreeDataBuilder;

    fn two_class_data() -> Result<TreeData> {
        let mut table = DataTable::new(vec![
            ColumnSpec::numeric("x"),
            ColumnSpec::numeric("y"),
            ColumnSpec::nominal("class"),
        ]);
        for i in 0..60 {
            let x = (i % 10) as f64;
            let y = (i / 10) as f64;
            let class = if x + y > 8.0 { "up" } else { "down" };
            table.push_row(
                format!("Row{}", i),
                vec![Cell::Numeric(x), Cell::Numeric(y), class.into()],
            )?;
        }
        TreeDataBuilder::new("class").build(&table)
    }

    #[test]
    fn same_seed_same_forest() -> Result<()> {
        let data = two_class_data()?;
        let params = RandomForest::params().tree_count(8).random_seed(11);

        let a = params.fit(&data)?;
        let b = params.fit(&data)?;
        assert_eq!(a, b);

        let c = params.random_seed(12).fit(&data)?;
        assert_ne!(a.members()[0].seed(), c.members()[0].seed());
        Ok(())
    }

    #[test]
    fn samples_are_stored_on_request() -> Result<()> {
        let data = two_class_data()?;
        let forest = RandomForest::params()
            .tree_count(3)
            .row_sampling_fraction(0.5)
            .row_sampling_with_replacement(false)
            .random_seed(1)
            .fit(&data)?;
        for member in forest.members() {
            let sample = member.sample().unwrap();
            assert_eq!(sample.len(), 30);
            assert_eq!(sample.distinct_count(), 30);
        }

        let forest = RandomForest::params()
            .tree_count(3)
            .store_row_samples(false)
            .random_seed(1)
            .fit(&data)?;
        assert!(forest.members().iter().all(|m| m.sample().is_none()));
        Ok(())
    }

    #[test]
    fn stratified_samples_keep_class_shares() -> Result<()> {
        let data = two_class_data()?;
        let codes = data.target().class_codes().unwrap().to_vec();
        let forest = RandomForest::params()
            .tree_count(4)
            .stratified_sampling(true)
            .row_sampling_fraction(0.5)
            .row_sampling_with_replacement(false)
            .random_seed(3)
            .fit(&data)?;

        for member in forest.members() {
            let sample = member.sample().unwrap();
            for class in 0..2u32 {
                let total = codes.iter().filter(|&&c| c == class).count();
                let drawn = sample
                    .indices()
                    .iter()
                    .filter(|&&row| codes[row] == class)
                    .count();
                assert_eq!(drawn, (total as f64 * 0.5).round() as usize);
            }
        }
        Ok(())
    }

    #[test]
    fn cancelled_before_start() -> Result<()> {
        let data = two_class_data()?;
        let cancel = CancelToken::new();
        cancel.cancel();

        let params = RandomForest::params().tree_count(5).check()?;
        assert!(matches!(
            params.fit_with_cancel(&data, &cancel),
            Err(Error::Cancelled)
        ));
        Ok(())
    }

    #[test]
    fn configuration_errors_come_first() -> Result<()> {
        let data = two_class_data()?;
        assert!(matches!(
            RandomForest::params()
                .always_include_attribute("z")
                .fit(&data),
            Err(Error::Parameters(_))
        ));
        assert!(matches!(
            RandomForest::params()
                .split_criterion(sylva_trees::SplitCriterion::SquaredError)
                .fit(&data),
            Err(Error::Parameters(_))
        ));
        Ok(())
    }
}
