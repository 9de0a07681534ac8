//! Criterion benchmarks for index construction and collection.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;
use wxcollect::cloud::UniformCloud;
use wxcollect::collection::CollectionEngine;
use wxcollect::scenario::{Scenario, ScenarioConfig};
use wxcollect::visibility::{AltitudeBands, VisibilitySampler};

/// The reference workload: 10,000 actors, 100 targets.
fn scenario() -> Scenario {
    Scenario::generate(&ScenarioConfig::default(), &mut StdRng::seed_from_u64(0)).unwrap()
}

fn quiet(parallel: bool) -> CollectionEngine {
    CollectionEngine {
        parallel,
        show_progress: false,
    }
}

fn bench_build(c: &mut Criterion) {
    let scenario = scenario();
    c.bench_function("build_10k_actors", |b| {
        b.iter(|| quiet(false).build(black_box(&scenario.actors)));
    });
}

fn bench_collect_serial(c: &mut Criterion) {
    let scenario = scenario();
    let index = quiet(false).build(&scenario.actors);
    let provider = UniformCloud::new(0.3, 0.6);
    let sampler = VisibilitySampler::new(&provider, AltitudeBands::default());
    c.bench_function("collect_100_targets_serial", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            quiet(false)
                .collect(&scenario.targets, &index, &sampler, &mut rng)
                .unwrap()
        });
    });
}

fn bench_collect_parallel(c: &mut Criterion) {
    let scenario = scenario();
    let index = quiet(true).build(&scenario.actors);
    let provider = UniformCloud::new(0.3, 0.6);
    let sampler = VisibilitySampler::new(&provider, AltitudeBands::default());
    c.bench_function("collect_100_targets_parallel", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            quiet(true)
                .collect(&scenario.targets, &index, &sampler, &mut rng)
                .unwrap()
        });
    });
}

fn bench_run(c: &mut Criterion) {
    // Wider targets so most of the time goes to sampling rather than the tree.
    let mut config = ScenarioConfig::default();
    config.target_region.half_extent.max = 5.0;
    let scenario = Scenario::generate(&config, &mut StdRng::seed_from_u64(0)).unwrap();
    let provider = UniformCloud::new(0.3, 0.6);
    let sampler = VisibilitySampler::new(&provider, AltitudeBands::default());
    c.bench_function("run_wide_targets", |b| {
        let mut rng = StdRng::seed_from_u64(2);
        b.iter(|| quiet(true).run(&scenario, &sampler, &mut rng).unwrap());
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_collect_serial,
    bench_collect_parallel,
    bench_run
);
criterion_main!(benches);
