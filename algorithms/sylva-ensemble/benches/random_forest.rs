use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sylva::benchmarks::{config, tables};
use sylva::prelude::*;
use sylva_ensemble::{PredictorOptions, RandomForest, VotingMethod};
use sylva_trees::TreeDataBuilder;

fn random_forest_bench(c: &mut Criterion) {
    let training_set_sizes = &[100, 1000, 10000];

    let hyperparams = RandomForest::params().tree_count(50).random_seed(42);

    let mut group = c.benchmark_group("random_forest");
    config::set_default_benchmark_configs(&mut group);

    for n in training_set_sizes.iter() {
        let table = tables::blobs(*n, 6, 5, 3, 42).unwrap();
        let data = TreeDataBuilder::new("class").build(&table).unwrap();
        let forest = hyperparams.fit(&data).unwrap();
        let options = PredictorOptions::default()
            .voting(VotingMethod::Soft)
            .class_confidences(true);

        group.bench_with_input(BenchmarkId::new("fit", n), &data, |b, d| {
            b.iter(|| hyperparams.fit(d))
        });
        group.bench_with_input(BenchmarkId::new("predict", n), &table, |b, t| {
            b.iter(|| forest.predict_table(t, &options))
        });
        group.bench_with_input(BenchmarkId::new("oob", n), &data, |b, d| {
            b.iter(|| forest.oob_estimate(d, VotingMethod::Hard))
        });
    }

    group.finish();
}

#[cfg(not(target_os = "windows"))]
criterion_group! {
    name = benches;
    config = config::get_default_profiling_configs();
    targets = random_forest_bench
}
#[cfg(target_os = "windows")]
criterion_group!(benches, random_forest_bench);

criterion_main!(benches);
