use std::fs;

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wxcollect::cloud::{CloudFractionProvider, CloudLayer, GriddedCloud, UniformCloud};
use wxcollect::collection::CollectionEngine;
use wxcollect::error::{CollectError, Result};
use wxcollect::index::SpatialIndex;
use wxcollect::result::CollectionReport;
use wxcollect::scenario::{Scenario, ScenarioConfig};
use wxcollect::settings;
use wxcollect::visibility::{AltitudeBands, VisibilitySampler, HIGH_ALTITUDE_THRESHOLD};
use wxcollect::volume::BoundingVolume;

fn engine(parallel: bool) -> CollectionEngine {
    CollectionEngine {
        parallel,
        show_progress: false,
    }
}

fn small_config() -> ScenarioConfig {
    ScenarioConfig {
        actor_count: 2_000,
        target_count: 40,
        ..Default::default()
    }
}

/// Targets wide enough that most of them catch something.
fn wide_config() -> ScenarioConfig {
    let mut config = small_config();
    config.target_region.half_extent.min = 2.0;
    config.target_region.half_extent.max = 6.0;
    config
}

fn run_with<P: CloudFractionProvider>(
    config: &ScenarioConfig,
    provider: &P,
    seed: u64,
    parallel: bool,
) -> CollectionReport {
    let mut rng = StdRng::seed_from_u64(seed);
    let scenario = Scenario::generate(config, &mut rng).unwrap();
    let sampler = VisibilitySampler::new(provider, AltitudeBands::default());
    engine(parallel).run(&scenario, &sampler, &mut rng).unwrap().report
}

#[test]
fn three_actor_scenario() {
    let actors = vec![
        BoundingVolume::actor("Actor: 1", 10.0, 10.0, 60_000.0).unwrap(),
        BoundingVolume::actor("Actor: 2", 10.0, 10.0, 10_000.0).unwrap(),
        BoundingVolume::actor("Actor: 3", 200.0, 200.0, 10_000.0).unwrap(),
    ];
    let targets = vec![BoundingVolume::target(
        "Location:0",
        Point3::new(5.0, 5.0, 0.0),
        Point3::new(15.0, 15.0, 70_000.0),
    )
    .unwrap()];
    let scenario = Scenario { actors, targets };

    let provider = UniformCloud::clear();
    let sampler = VisibilitySampler::new(&provider, AltitudeBands::default());
    let mut rng = StdRng::seed_from_u64(0);
    let run = engine(true).run(&scenario, &sampler, &mut rng).unwrap();

    assert_eq!(run.report.len(), 1);
    let entry = run.report.get("Location:0").unwrap();
    assert_eq!(entry.candidates, 2);
    let captured: Vec<_> = entry.captures.iter().map(|c| c.actor.as_str()).collect();
    assert_eq!(captured, ["Actor: 1", "Actor: 2"]);
    assert_eq!(entry.captures[1].volume.altitude(), 10_000.0);
}

#[test]
fn same_seed_same_report() {
    let provider = UniformCloud::new(0.4, 0.5);
    let a = run_with(&wide_config(), &provider, 42, true);
    let b = run_with(&wide_config(), &provider, 42, true);
    assert_eq!(a, b);
    assert!(a.total_captures() > 0);
    assert_eq!(a.capture_pairs(), b.capture_pairs());
}

#[test]
fn serial_matches_parallel() {
    let provider = UniformCloud::new(0.4, 0.5);
    let serial = run_with(&wide_config(), &provider, 7, false);
    let parallel = run_with(&wide_config(), &provider, 7, true);
    assert_eq!(serial, parallel);
}

#[test]
fn every_target_has_an_entry() {
    let config = small_config();
    let report = run_with(&config, &UniformCloud::new(0.5, 0.5), 3, true);
    assert_eq!(report.len(), config.target_count);
    let labels: Vec<_> = report.iter().map(|c| c.target.clone()).collect();
    let expected: Vec<_> = (0..config.target_count)
        .map(|i| format!("Location:{}", i))
        .collect();
    assert_eq!(labels, expected);
}

#[test]
fn clear_sky_captures_every_candidate() {
    let report = run_with(&wide_config(), &UniformCloud::clear(), 5, true);
    assert!(report.total_candidates() > 0);
    assert_eq!(report.total_captures(), report.total_candidates());
}

#[test]
fn overcast_captures_only_above_ceiling() {
    let report = run_with(&wide_config(), &UniformCloud::new(1.0, 0.0), 5, true);
    assert!(report.total_candidates() > report.total_captures());
    for entry in &report {
        for capture in &entry.captures {
            assert!(capture.volume.altitude() > HIGH_ALTITUDE_THRESHOLD);
        }
    }
    // the bypass is unconditional, so the high-flyers are all still there
    let clear = run_with(&wide_config(), &UniformCloud::clear(), 5, true);
    let high_flyers = clear
        .iter()
        .flat_map(|c| c.captures.iter())
        .filter(|c| c.volume.altitude() > HIGH_ALTITUDE_THRESHOLD)
        .count();
    assert_eq!(report.total_captures(), high_flyers);
}

#[test]
fn query_matches_overlap_predicate() {
    let mut rng = StdRng::seed_from_u64(11);
    let scenario = Scenario::generate(&wide_config(), &mut rng).unwrap();
    let index = engine(false).build(&scenario.actors);
    for target in &scenario.targets {
        let mut found: Vec<_> = index
            .query(target)
            .into_iter()
            .map(|(label, _)| label.clone())
            .collect();
        found.sort();
        let mut expected: Vec<_> = scenario
            .actors
            .iter()
            .filter(|a| a.intersects(target))
            .map(|a| a.label().to_string())
            .collect();
        expected.sort();
        assert_eq!(found, expected, "{}", target.label());
    }
}

#[test]
fn touching_faces_overlap() {
    let mut index = SpatialIndex::new();
    let cube = BoundingVolume::target("cube", Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
        .unwrap();
    index.insert(cube, "cube");

    let touching = BoundingVolume::target(
        "touching",
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 1.0, 1.0),
    )
    .unwrap();
    assert_eq!(index.query(&touching).len(), 1);

    let apart = BoundingVolume::target(
        "apart",
        Point3::new(0.0, 0.0, 1.0 + 1e-9),
        Point3::new(1.0, 1.0, 2.0),
    )
    .unwrap();
    assert!(index.query(&apart).is_empty());
}

struct Failing;

impl CloudFractionProvider for Failing {
    fn fraction(&self, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64> {
        Err(CollectError::ProviderLookup {
            latitude,
            longitude,
            layer,
            reason: "missing reference data".to_string(),
        })
    }
}

#[test]
fn provider_failure_aborts_the_run() {
    let mut rng = StdRng::seed_from_u64(1);
    let scenario = Scenario::generate(&wide_config(), &mut rng).unwrap();
    let sampler = VisibilitySampler::new(&Failing, AltitudeBands::default());
    let err = engine(true).run(&scenario, &sampler, &mut rng).unwrap_err();
    let (target, actor) = err.pair().unwrap();
    assert!(target.starts_with("Location:"));
    assert!(actor.starts_with("Actor: "));
    assert!(err.to_string().contains(target), "{}", err);
}

#[test]
fn gridded_cloud_end_to_end() {
    let dir = std::env::temp_dir().join(format!("wxcollect-grid-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    // Fully overcast everywhere at the high layer, clear at the medium layer.
    let overcast = r#"{"lat_start": 15.0, "lat_step": 0.25, "lon_start": 55.0, "lon_step": 0.25,
        "values": [[1.0, 1.0], [1.0, 1.0]]}"#;
    let clear = r#"{"lat_start": 15.0, "lat_step": 0.25, "lon_start": 55.0, "lon_step": 0.25,
        "values": [[0.0, 0.0], [0.0, 0.0]]}"#;
    fs::write(dir.join("hcc.json"), overcast).unwrap();
    fs::write(dir.join("mcc.json"), clear).unwrap();

    let provider = GriddedCloud::from_json_files(dir.join("hcc.json"), dir.join("mcc.json")).unwrap();
    let gridded = run_with(&wide_config(), &provider, 9, true);
    let uniform = run_with(&wide_config(), &UniformCloud::new(1.0, 0.0), 9, true);
    assert_eq!(gridded, uniform);
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn default_config_runs() {
    let mut settings = settings::load_default_config().unwrap();
    settings.actor_count = 500;
    settings.target_count = 10;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let scenario = Scenario::generate(&settings.scenario(), &mut rng).unwrap();
    let provider = settings.cloud.provider().unwrap();
    let sampler = VisibilitySampler::new(&provider, settings.bands());
    let run = CollectionEngine {
        show_progress: false,
        ..CollectionEngine::from_settings(&settings)
    }
    .run(&scenario, &sampler, &mut rng)
    .unwrap();
    assert_eq!(run.report.len(), 10);
    assert!(run.timings.total() >= run.timings.build);
}
