//! Row and attribute sampling
//!
//! Ensembles decorrelate their members by training every tree on a different subset of the rows
//! and by restricting every split search to a random subset of the attributes. This module
//! implements both draws and the per-tree bookkeeping of which rows were used for training
//! ("in-bag") and which were not ("out-of-bag").

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use tracing::trace;

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The rows drawn to train a single tree
///
/// Holds the drawn multiset of row indices (duplicates are possible when drawing with
/// replacement) and a per-row draw count derived once, so that membership tests are O(1).
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct RowSample {
    indices: Vec<usize>,
    counts: Vec<u32>,
}

impl RowSample {
    /// A sample holding every row exactly once
    pub fn all(row_count: usize) -> Self {
        RowSample {
            indices: (0..row_count).collect(),
            counts: vec![1; row_count],
        }
    }

    /// Builds a sample from drawn row indices
    ///
    /// ### Panics
    ///
    /// If an index is not smaller than `row_count`
    pub fn from_indices(row_count: usize, mut indices: Vec<usize>) -> Self {
        let mut counts = vec![0u32; row_count];
        for &idx in &indices {
            counts[idx] += 1;
        }
        indices.sort_unstable();

        RowSample { indices, counts }
    }

    /// Draws `round(fraction * row_count)` rows with a generator seeded by `seed`
    ///
    /// Identical arguments always produce identical samples.
    pub fn create(
        row_count: usize,
        fraction: f64,
        with_replacement: bool,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::draw(row_count, fraction, with_replacement, &mut rng)
    }

    /// Draws `round(fraction * row_count)` rows, at least one
    ///
    /// With replacement every draw is uniform over all rows (a classic bootstrap for
    /// `fraction = 1`), without replacement the drawn rows are distinct.
    pub fn draw<R: Rng + ?Sized>(
        row_count: usize,
        fraction: f64,
        with_replacement: bool,
        rng: &mut R,
    ) -> Result<Self> {
        check_fraction(fraction)?;
        if row_count == 0 {
            return Err(Error::EmptyTable);
        }

        let n_draws = draw_count(row_count, fraction);
        trace!(row_count, n_draws, with_replacement, "drawing row sample");
        let indices = draw_indices(row_count, n_draws, with_replacement, rng);

        Ok(Self::from_indices(row_count, indices))
    }

    /// Stratified variant of [`create`](RowSample::create)
    pub fn create_stratified(
        strata: &[usize],
        fraction: f64,
        with_replacement: bool,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::draw_stratified(strata, fraction, with_replacement, &mut rng)
    }

    /// Stratified variant of [`draw`](RowSample::draw)
    ///
    /// `strata[row]` is the stratum (usually the class) of a row. Every stratum contributes
    /// `round(fraction * stratum size)` rows, at least one, so that the class distribution of
    /// the sample follows the one of the table.
    pub fn draw_stratified<R: Rng + ?Sized>(
        strata: &[usize],
        fraction: f64,
        with_replacement: bool,
        rng: &mut R,
    ) -> Result<Self> {
        check_fraction(fraction)?;
        if strata.is_empty() {
            return Err(Error::EmptyTable);
        }

        let n_strata = strata.iter().max().map(|m| m + 1).unwrap_or(0);
        let mut members = vec![Vec::new(); n_strata];
        for (row, &stratum) in strata.iter().enumerate() {
            members[stratum].push(row);
        }

        let mut indices = Vec::new();
        for rows in members.iter().filter(|rows| !rows.is_empty()) {
            let n_draws = draw_count(rows.len(), fraction);
            indices.extend(
                draw_indices(rows.len(), n_draws, with_replacement, rng)
                    .into_iter()
                    .map(|i| rows[i]),
            );
        }

        Ok(Self::from_indices(strata.len(), indices))
    }

    /// Number of rows of the table the sample was drawn from
    pub fn row_count(&self) -> usize {
        self.counts.len()
    }

    /// Number of draws, duplicates included
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Drawn row indices in ascending order, duplicates included
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// How often a row was drawn
    pub fn count(&self, row: usize) -> u32 {
        self.counts.get(row).copied().unwrap_or(0)
    }

    pub fn is_in_bag(&self, row: usize) -> bool {
        self.count(row) > 0
    }

    /// Distinct in-bag rows in ascending order
    pub fn in_bag_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(row, _)| row)
    }

    /// Out-of-bag rows in ascending order
    pub fn out_of_bag_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(row, _)| row)
    }

    /// Number of distinct in-bag rows
    pub fn distinct_count(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

fn check_fraction(fraction: f64) -> Result<()> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(Error::Parameters(format!(
            "Row sampling fraction should be in (0, 1], but was {}",
            fraction
        )))
    }
}

fn draw_count(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).round() as usize).max(1).min(n)
}

fn draw_indices<R: Rng + ?Sized>(
    n: usize,
    n_draws: usize,
    with_replacement: bool,
    rng: &mut R,
) -> Vec<usize> {
    if with_replacement {
        (0..n_draws).map(|_| rng.gen_range(0..n)).collect()
    } else {
        sample(rng, n, n_draws).into_vec()
    }
}

/// Number of attributes considered at every split
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeSampleSize {
    /// Every attribute
    All,
    /// `round(sqrt(n))` attributes
    Sqrt,
    /// `round(fraction * n)` attributes
    Fraction(f64),
    /// A fixed number of attributes
    Absolute(usize),
}

impl AttributeSampleSize {
    /// Resolves the size against `n` attributes, the result is always in `[1, n]` for `n > 0`
    pub fn resolve(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let k = match *self {
            AttributeSampleSize::All => n,
            AttributeSampleSize::Sqrt => (n as f64).sqrt().round() as usize,
            AttributeSampleSize::Fraction(f) => (n as f64 * f).round() as usize,
            AttributeSampleSize::Absolute(k) => k,
        };
        k.max(1).min(n)
    }

    /// Rejects fractions outside of `(0, 1]` and an absolute size of zero
    pub fn check(&self) -> Result<()> {
        match *self {
            AttributeSampleSize::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(Error::Parameters(format!(
                    "Attribute sample fraction should be in (0, 1], but was {}",
                    f
                )))
            }
            AttributeSampleSize::Absolute(0) => Err(Error::Parameters(
                "Attribute sample size should be at least one".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for AttributeSampleSize {
    fn default() -> Self {
        AttributeSampleSize::All
    }
}

/// When attribute subsets are drawn
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSampleMode {
    /// One subset per tree, reused at every node
    PerTree,
    /// A fresh subset at every node
    PerNode,
}

impl Default for AttributeSampleMode {
    fn default() -> Self {
        AttributeSampleMode::PerNode
    }
}

/// Draws attribute subsets of a fixed size
///
/// An attribute registered with `always_include` is part of every subset that can hold it, the
/// remaining places are drawn uniformly from the other candidates. Subsets are returned in
/// ascending order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSampler {
    k: usize,
    always_include: Option<usize>,
}

impl AttributeSampler {
    pub fn new(k: usize, always_include: Option<usize>) -> Self {
        AttributeSampler { k, always_include }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn sample<R: Rng + ?Sized>(&self, candidates: &[usize], rng: &mut R) -> Vec<usize> {
        let mut subset = if self.k >= candidates.len() {
            candidates.to_vec()
        } else {
            let forced = self.always_include.filter(|a| candidates.contains(a));
            let pool: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&a| Some(a) != forced)
                .collect();
            let n_drawn = self.k - forced.map(|_| 1).unwrap_or(0);

            let mut subset: Vec<usize> = sample(rng, pool.len(), n_drawn.min(pool.len()))
                .into_iter()
                .map(|i| pool[i])
                .collect();
            subset.extend(forced);
            subset
        };
        subset.sort_unstable();
        subset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bootstrap_is_deterministic() -> Result<()> {
        let a = RowSample::create(100, 1.0, true, 42)?;
        let b = RowSample::create(100, 1.0, true, 42)?;
        assert_eq!(a, b);
        assert_eq!(a.indices(), b.indices());

        let c = RowSample::create(100, 1.0, true, 43)?;
        assert_ne!(a.indices(), c.indices());
        Ok(())
    }

    #[test]
    fn bootstrap_draws_all_with_duplicates() -> Result<()> {
        let sample = RowSample::create(10_000, 1.0, true, 7)?;
        assert_eq!(sample.len(), 10_000);

        // expected share of unique rows is 1 - 1/e ~ 0.632
        let unique = sample.distinct_count() as f64 / 10_000.0;
        assert_abs_diff_eq!(unique, 0.632, epsilon = 0.02);
        assert_eq!(
            sample.in_bag_rows().count() + sample.out_of_bag_rows().count(),
            10_000
        );
        Ok(())
    }

    #[test]
    fn subset_without_replacement_has_distinct_rows() -> Result<()> {
        let sample = RowSample::create(20, 0.5, false, 1)?;
        assert_eq!(sample.len(), 10);
        assert_eq!(sample.distinct_count(), 10);
        assert!(sample.indices().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sample.out_of_bag_rows().count(), 10);
        Ok(())
    }

    #[test]
    fn full_subset_has_no_out_of_bag_rows() -> Result<()> {
        let sample = RowSample::create(15, 1.0, false, 3)?;
        assert_eq!(sample.out_of_bag_rows().count(), 0);
        assert_eq!(sample, RowSample::all(15));
        Ok(())
    }

    #[test]
    fn membership_follows_counts() {
        let sample = RowSample::from_indices(5, vec![3, 0, 3]);
        assert_eq!(sample.indices(), &[0, 3, 3]);
        assert_eq!(sample.count(3), 2);
        assert!(sample.is_in_bag(0));
        assert!(!sample.is_in_bag(1));
        assert!(!sample.is_in_bag(99));
        assert_eq!(sample.out_of_bag_rows().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        assert!(RowSample::create(10, 0.0, true, 0).is_err());
        assert!(RowSample::create(10, 1.5, true, 0).is_err());
        assert!(RowSample::create(10, f64::NAN, true, 0).is_err());
        assert!(matches!(
            RowSample::create(0, 1.0, true, 0),
            Err(Error::EmptyTable)
        ));
    }

    #[test]
    fn tiny_fraction_draws_one_row() -> Result<()> {
        assert_eq!(RowSample::create(10, 0.01, false, 0)?.len(), 1);
        Ok(())
    }

    #[test]
    fn stratified_sample_keeps_class_shares() -> Result<()> {
        let strata: Vec<usize> = (0..100).map(|i| if i < 80 { 0 } else { 1 }).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let sample = RowSample::draw_stratified(&strata, 0.5, false, &mut rng)?;

        assert_eq!(sample.len(), 50);
        let minority = sample.indices().iter().filter(|&&r| r >= 80).count();
        assert_eq!(minority, 10);
        Ok(())
    }

    #[test]
    fn resolve_attribute_sample_size() {
        assert_eq!(AttributeSampleSize::Sqrt.resolve(10), 3);
        assert_eq!(AttributeSampleSize::Sqrt.resolve(1), 1);
        assert_eq!(AttributeSampleSize::All.resolve(7), 7);
        assert_eq!(AttributeSampleSize::Fraction(0.5).resolve(7), 4);
        assert_eq!(AttributeSampleSize::Absolute(20).resolve(7), 7);
        assert_eq!(AttributeSampleSize::Absolute(2).resolve(7), 2);
        assert_eq!(AttributeSampleSize::Sqrt.resolve(0), 0);
    }

    #[test]
    fn attribute_sampler_draws_sorted_subsets() {
        let candidates: Vec<usize> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let sampler = AttributeSampler::new(4, None);

        let subset = sampler.sample(&candidates, &mut rng);
        assert_eq!(subset.len(), 4);
        assert!(subset.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(sampler.sample(&[5, 2], &mut rng), vec![2, 5]);
    }

    #[test]
    fn attribute_sampler_keeps_forced_attribute() {
        let candidates: Vec<usize> = (0..20).collect();
        let mut rng = StdRng::seed_from_u64(2);
        let sampler = AttributeSampler::new(3, Some(17));

        for _ in 0..50 {
            let subset = sampler.sample(&candidates, &mut rng);
            assert_eq!(subset.len(), 3);
            assert!(subset.contains(&17));
        }
    }
}
