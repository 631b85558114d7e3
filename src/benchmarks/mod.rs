//! Shared setup of the criterion benchmarks of the algorithm crates
#[cfg(feature = "benchmarks")]
pub mod config {
    use criterion::{measurement::WallTime, BenchmarkGroup, Criterion};
    #[cfg(not(target_os = "windows"))]
    use pprof::criterion::{Output, PProfProfiler};
    use std::time::Duration;

    #[cfg(not(target_os = "windows"))]
    pub fn get_default_profiling_configs() -> Criterion {
        Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
    }

    /// Growing trees on the larger tables takes seconds, keep the sample small
    pub fn set_default_benchmark_configs(benchmark: &mut BenchmarkGroup<WallTime>) {
        benchmark
            .sample_size(20)
            .measurement_time(Duration::new(20, 0))
            .confidence_level(0.95)
            .warm_up_time(Duration::new(5, 0))
            .noise_threshold(0.05);
    }
}

/// Synthetic training tables
#[cfg(feature = "benchmarks")]
pub mod tables {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use crate::dataset::{Cell, ColumnSpec, DataTable};
    use crate::error::Result;

    /// Table with `n_numeric` numeric attributes, one nominal attribute with `n_categories`
    /// values and a nominal `class` column with `n_classes` values
    ///
    /// Every class is a blob around its own center, the nominal attribute agrees with the class
    /// for half of the rows. About 5% of the numeric cells are missing.
    pub fn blobs(
        nrows: usize,
        n_numeric: usize,
        n_categories: usize,
        n_classes: usize,
        seed: u64,
    ) -> Result<DataTable> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let centers: Vec<Vec<f64>> = (0..n_classes)
            .map(|_| (0..n_numeric).map(|_| rng.gen_range(-10.0..10.0)).collect())
            .collect();

        let mut columns: Vec<ColumnSpec> = (0..n_numeric)
            .map(|i| ColumnSpec::numeric(format!("x{}", i)))
            .collect();
        columns.push(ColumnSpec::nominal("category"));
        columns.push(ColumnSpec::nominal("class"));

        let mut table = DataTable::new(columns);
        for row in 0..nrows {
            let class = row % n_classes;
            let mut cells: Vec<Cell> = centers[class]
                .iter()
                .map(|c| {
                    if rng.gen_bool(0.05) {
                        Cell::Missing
                    } else {
                        Cell::Numeric(c + rng.gen_range(-8.0..8.0))
                    }
                })
                .collect();
            let category = if rng.gen_bool(0.5) {
                class % n_categories
            } else {
                rng.gen_range(0..n_categories)
            };
            cells.push(Cell::Nominal(format!("c{}", category)));
            cells.push(Cell::Nominal(format!("class{}", class)));
            table.push_row(format!("Row{}", row), cells)?;
        }
        Ok(table)
    }
}
