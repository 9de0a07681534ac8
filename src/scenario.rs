//! Random scenario generation.
//!
//! Places actors as points and targets as boxes inside configurable
//! longitude/latitude/altitude regions. All randomness comes from the RNG
//! handed in by the caller, so a run is reproducible from its seed alone.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{CollectError, Result};
use crate::volume::BoundingVolume;
use nalgebra::Point3;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn actors_are_points_inside_region() {
        let region = ActorRegion::default();
        let mut rng = StdRng::seed_from_u64(0);
        let actors = generate_actors(500, &region, &mut rng).unwrap();
        assert_eq!(actors.len(), 500);
        for (i, actor) in actors.iter().enumerate() {
            assert_eq!(actor.label(), format!("Actor: {}", i));
            assert_eq!(actor.min(), actor.max());
            assert!(region.longitude.contains(actor.longitude()));
            assert!(region.latitude.contains(actor.latitude()));
            assert!(region.altitude.contains(actor.altitude()));
            assert_eq!(actor.altitude().fract(), 0.0);
        }
    }

    #[test]
    fn targets_span_altitude_band() {
        let region = TargetRegion::default();
        let mut rng = StdRng::seed_from_u64(0);
        let targets = generate_targets(200, &region, &mut rng).unwrap();
        assert_eq!(targets[3].label(), "Location:3");
        for target in targets.iter() {
            let (min, max) = (target.min(), target.max());
            assert_eq!(min.z, region.altitude.min);
            assert_eq!(max.z, region.altitude.max);
            let half_x = (max.x - min.x) / 2.0;
            let half_y = (max.y - min.y) / 2.0;
            assert!(region.half_extent.contains(half_x), "half_x: {}", half_x);
            assert!(region.half_extent.contains(half_y), "half_y: {}", half_y);
            assert!(region.longitude.contains((min.x + max.x) / 2.0));
        }
    }

    #[test]
    fn same_seed_same_scenario() {
        let config = ScenarioConfig {
            actor_count: 100,
            target_count: 10,
            ..Default::default()
        };
        let a = Scenario::generate(&config, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = Scenario::generate(&config, &mut StdRng::seed_from_u64(9)).unwrap();
        let c = Scenario::generate(&config, &mut StdRng::seed_from_u64(10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_range_is_rejected() {
        let region = ActorRegion {
            latitude: SampleRange::new(80.0, 15.0),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            generate_actors(1, &region, &mut rng),
            Err(CollectError::InvalidRange { .. })
        ));
    }
}

/// Closed sampling interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub min: f64,
    pub max: f64,
}

impl SampleRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Uniform distribution over the range, or an error naming the range.
    pub fn uniform(&self, name: &str) -> Result<Uniform<f64>> {
        let invalid = || CollectError::InvalidRange {
            name: name.to_string(),
            low: self.min,
            high: self.max,
        };
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(invalid());
        }
        Uniform::new_inclusive(self.min, self.max).map_err(|_| invalid())
    }
}

/// Where actors are placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorRegion {
    pub longitude: SampleRange,
    pub latitude: SampleRange,
    pub altitude: SampleRange,
}

impl Default for ActorRegion {
    fn default() -> Self {
        Self {
            longitude: SampleRange::new(60.0, 120.0),
            latitude: SampleRange::new(15.0, 80.0),
            altitude: SampleRange::new(12_000.0, 60_000.0),
        }
    }
}

/// Where targets are centred and how large they are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetRegion {
    pub longitude: SampleRange,
    pub latitude: SampleRange,
    /// Every target spans this whole altitude band.
    pub altitude: SampleRange,
    /// Half width (longitude) and half height (latitude) are drawn
    /// independently from this range.
    pub half_extent: SampleRange,
}

impl Default for TargetRegion {
    fn default() -> Self {
        Self {
            longitude: SampleRange::new(55.0, 125.0),
            latitude: SampleRange::new(15.0, 80.0),
            altitude: SampleRange::new(12_000.0, 60_000.0),
            half_extent: SampleRange::new(0.002, 0.5),
        }
    }
}

/// Sizes and regions of a generated scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub actor_count: usize,
    pub target_count: usize,
    pub actor_region: ActorRegion,
    pub target_region: TargetRegion,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            actor_count: 10_000,
            target_count: 100,
            actor_region: ActorRegion::default(),
            target_region: TargetRegion::default(),
        }
    }
}

/// Actor set and target deck handed to the collection engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub actors: Vec<BoundingVolume>,
    pub targets: Vec<BoundingVolume>,
}

impl Scenario {
    /// Draws the actors, then the targets, from `rng`.
    pub fn generate<R: Rng + ?Sized>(config: &ScenarioConfig, rng: &mut R) -> Result<Self> {
        let actors = generate_actors(config.actor_count, &config.actor_region, rng)?;
        let targets = generate_targets(config.target_count, &config.target_region, rng)?;
        Ok(Self { actors, targets })
    }
}

/// Zero-extent actors labelled `"Actor: {i}"`, altitude truncated to whole units.
pub fn generate_actors<R: Rng + ?Sized>(
    count: usize,
    region: &ActorRegion,
    rng: &mut R,
) -> Result<Vec<BoundingVolume>> {
    let lon = region.longitude.uniform("actor longitude")?;
    let lat = region.latitude.uniform("actor latitude")?;
    let alt = region.altitude.uniform("actor altitude")?;

    (0..count)
        .map(|i| {
            let (x, y, z) = (lon.sample(rng), lat.sample(rng), alt.sample(rng).trunc());
            BoundingVolume::actor(format!("Actor: {}", i), x, y, z)
        })
        .collect()
}

/// Boxes labelled `"Location:{i}"` centred at a random point, spanning the
/// full altitude band.
pub fn generate_targets<R: Rng + ?Sized>(
    count: usize,
    region: &TargetRegion,
    rng: &mut R,
) -> Result<Vec<BoundingVolume>> {
    let lon = region.longitude.uniform("target longitude")?;
    let lat = region.latitude.uniform("target latitude")?;
    let extent = region.half_extent.uniform("target half extent")?;
    region.altitude.uniform("target altitude")?;

    (0..count)
        .map(|i| {
            let (x, y) = (lon.sample(rng), lat.sample(rng));
            let (w, h) = (extent.sample(rng), extent.sample(rng));
            BoundingVolume::target(
                format!("Location:{}", i),
                Point3::new(x - w, y - h, region.altitude.min),
                Point3::new(x + w, y + h, region.altitude.max),
            )
        })
        .collect()
}
