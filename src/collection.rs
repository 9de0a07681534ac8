//! Collection orchestration: index build, per-target query, visibility filter.
//!
//! This module ties the spatial index and the visibility sampler together to
//! turn an actor set and a target deck into a [`CollectionReport`].
//!
//! The collection engine provides:
//! - One-shot index construction over every actor
//! - Per-target range queries against the built index
//! - Visibility filtering of every candidate hit
//! - Parallel evaluation of targets with rayon and a progress bar
//! - Reproducible sampling: each target draws from its own RNG derived from
//!   the caller's RNG, so serial and parallel runs agree
//! - All-or-nothing error semantics naming the failing target/actor pair

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::cloud::CloudFractionProvider;
use crate::error::Result;
use crate::index::SpatialIndex;
use crate::result::{CandidateHit, Capture, CollectionReport, CollectionRun, RunTimings, TargetCollection};
use crate::scenario::Scenario;
use crate::settings::Settings;
use crate::visibility::VisibilitySampler;
use crate::volume::BoundingVolume;


/// Orchestrates index construction and per-target collection.
///
/// **Context**: A run queries a few hundred target boxes against thousands of
/// actors and samples cloud cover for every overlap. Targets are independent
/// of each other once the index is built, so they can be spread across
/// threads.
///
/// **How it Works**: `build` packs every actor into a [`SpatialIndex`] keyed
/// by label. `collect` draws one base seed from the caller's RNG, then for
/// target `i` seeds a private `StdRng` with `base + i`, queries the index,
/// orders the hits by actor label and keeps those the sampler marks as
/// captured. Results are collected in target order. The first error aborts
/// the run and carries the target/actor pair being evaluated.
///
/// Targets and actors are [`BoundingVolume`]s, whose constructors reject
/// inverted or NaN bounds, so a malformed box is refused before it gets here.
/// The errors seen during collection come from the cloud-fraction provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionEngine {
    /// Evaluate targets on the rayon pool.
    pub parallel: bool,
    /// Draw a progress bar over targets.
    pub show_progress: bool,
}

impl Default for CollectionEngine {
    fn default() -> Self {
        Self {
            parallel: true,
            show_progress: false,
        }
    }
}

impl CollectionEngine {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parallel: settings.parallel,
            show_progress: settings.show_progress,
        }
    }

    /// Inserts every actor once, with its label as payload.
    pub fn build(&self, actors: &[BoundingVolume]) -> SpatialIndex<String> {
        let start = Instant::now();
        let entries = actors
            .iter()
            .map(|actor| (actor.clone(), actor.label().to_string()))
            .collect();
        let index = SpatialIndex::bulk_load(entries);
        info!(
            "Indexed {} actors in {:.2?}",
            index.len(),
            start.elapsed()
        );
        index
    }

    /// Queries every target and keeps the visible hits.
    pub fn collect<P, R>(
        &self,
        targets: &[BoundingVolume],
        index: &SpatialIndex<String>,
        sampler: &VisibilitySampler<'_, P>,
        rng: &mut R,
    ) -> Result<CollectionReport>
    where
        P: CloudFractionProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let base_seed: u64 = rng.random();
        let pb = self.progress_bar(targets.len());

        let evaluate = |(i, target): (usize, &BoundingVolume)| {
            let mut target_rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let collection = collect_target(target, index, sampler, &mut target_rng);
            pb.inc(1);
            collection
        };

        let collections = if self.parallel {
            targets
                .par_iter()
                .enumerate()
                .map(evaluate)
                .collect::<Result<Vec<_>>>()
        } else {
            targets
                .iter()
                .enumerate()
                .map(evaluate)
                .collect::<Result<Vec<_>>>()
        };
        pb.finish_and_clear();
        let report = CollectionReport::new(collections?);

        info!(
            "Collected {} targets in {:.2?}: {} candidates, {} captures",
            report.len(),
            start.elapsed(),
            report.total_candidates(),
            report.total_captures()
        );
        Ok(report)
    }

    /// Builds the index over `scenario.actors` and collects `scenario.targets`.
    pub fn run<P, R>(
        &self,
        scenario: &Scenario,
        sampler: &VisibilitySampler<'_, P>,
        rng: &mut R,
    ) -> Result<CollectionRun>
    where
        P: CloudFractionProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let index = self.build(&scenario.actors);
        let build = start.elapsed();

        let start = Instant::now();
        let report = self.collect(&scenario.targets, &index, sampler, rng)?;
        let collect = start.elapsed();

        Ok(CollectionRun {
            report,
            timings: RunTimings { build, collect },
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }
        pb.set_message("target".to_string());
        pb
    }
}

/// Query one target and filter its hits through the sampler.
fn collect_target<P, R>(
    target: &BoundingVolume,
    index: &SpatialIndex<String>,
    sampler: &VisibilitySampler<'_, P>,
    rng: &mut R,
) -> Result<TargetCollection>
where
    P: CloudFractionProvider + ?Sized,
    R: Rng + ?Sized,
{
    let mut hits: Vec<CandidateHit<'_>> = index
        .query(target)
        .into_iter()
        .map(|(actor, volume)| CandidateHit {
            target: target.label(),
            actor: actor.as_str(),
            volume,
        })
        .collect();
    // tree layout must not leak into the draw order
    hits.sort_by(|a, b| a.actor.cmp(b.actor));

    let mut collection = TargetCollection::empty(target);
    collection.candidates = hits.len();
    for hit in hits {
        let captured = sampler
            .sample(hit.volume, rng)
            .map_err(|e| e.at_pair(hit.target, hit.actor))?;
        if captured {
            collection.captures.push(Capture::from(hit));
        }
    }
    debug!(
        "{}: {} of {} candidates captured",
        collection.target,
        collection.captures.len(),
        collection.candidates
    );
    Ok(collection)
}
