use anyhow::Result;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wxcollect::collection::CollectionEngine;
use wxcollect::output;
use wxcollect::scenario::Scenario;
use wxcollect::settings::{self};
use wxcollect::visibility::VisibilitySampler;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    info!("{}", settings);

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let scenario = Scenario::generate(&settings.scenario(), &mut rng)?;
    let provider = settings.cloud.provider()?;
    let sampler = VisibilitySampler::new(&provider, settings.bands());

    let engine = CollectionEngine::from_settings(&settings);
    let run = engine.run(&scenario, &sampler, &mut rng)?;

    run.report.print();
    println!(
        "time to process {} actors and {} targets: {:.3} s (index {:.3} s)",
        scenario.actors.len(),
        scenario.targets.len(),
        run.timings.total().as_secs_f64(),
        run.timings.build.as_secs_f64()
    );

    output::write_outputs(&settings, &scenario, &run)?;
    Ok(())
}
