//! Layered cloud-obscuration sampling.
//!
//! Decides whether an actor that lies inside a target volume is actually seen.
//! The decision is a cascade of Bernoulli draws, one per applicable cloud
//! layer, written as a small state machine:
//!
//! ```text
//! NotEvaluated ──(alt > high)──────────────────────────────► Final{true}
//!      │
//!      └─(draw high layer)─► HighLayerChecked{c}
//!                               ├─(c && alt <= medium)─► MediumLayerChecked{c'} ─► Final{c'}
//!                               └─(otherwise)──────────────────────────────────► Final{c}
//! ```
//!
//! Each layer check asks the provider for the layer's cloud fraction `p` and
//! captures with probability `1 - p`.

use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use crate::cloud::{CloudFractionProvider, CloudLayer};
use crate::error::{CollectError, Result};
use crate::volume::BoundingVolume;


/// Altitude above which actors are above every cloud layer.
pub const HIGH_ALTITUDE_THRESHOLD: f64 = 50_000.0;
/// Altitude at or below which the medium cloud layer also applies.
pub const MEDIUM_ALTITUDE_THRESHOLD: f64 = 25_000.0;

/// Altitude thresholds separating the cloud layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBands {
    /// Strictly above this, the actor is captured without sampling.
    pub high: f64,
    /// At or below this, an actor that passed the high layer is rechecked
    /// against the medium layer.
    pub medium: f64,
}

impl Default for AltitudeBands {
    fn default() -> Self {
        Self {
            high: HIGH_ALTITUDE_THRESHOLD,
            medium: MEDIUM_ALTITUDE_THRESHOLD,
        }
    }
}

/// Progress of one capture decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    NotEvaluated,
    HighLayerChecked { captured: bool },
    MediumLayerChecked { captured: bool },
    Final { captured: bool },
}

impl CaptureState {
    /// The decision, once the state is final.
    pub fn outcome(self) -> Option<bool> {
        match self {
            CaptureState::Final { captured } => Some(captured),
            _ => None,
        }
    }
}

/// Visibility filter applied to every candidate hit.
///
/// **Context**: An actor geometrically inside a target is only collected if
/// no cloud layer between it and the sensor hides it. Cloud cover is known as
/// a per-location fraction, so visibility is sampled rather than computed.
///
/// **How it Works**: Walks [`CaptureState`] from `NotEvaluated` to `Final`.
/// Actors strictly above the high band are captured with no provider lookup.
/// Otherwise the high layer is drawn, and only actors that survived it and
/// sit at or below the medium band are redrawn against the medium layer,
/// whose result replaces the first. Each decision therefore costs zero to two
/// lookups and draws. Any fraction that is not a finite number in `[0, 1]`
/// aborts the decision with [`CollectError::ProviderLookup`].
pub struct VisibilitySampler<'a, P: ?Sized> {
    provider: &'a P,
    bands: AltitudeBands,
}

impl<'a, P> VisibilitySampler<'a, P>
where
    P: CloudFractionProvider + ?Sized,
{
    pub fn new(provider: &'a P, bands: AltitudeBands) -> Self {
        Self { provider, bands }
    }

    /// Runs the state machine to completion for `actor`.
    pub fn sample<R: Rng + ?Sized>(&self, actor: &BoundingVolume, rng: &mut R) -> Result<bool> {
        let mut state = CaptureState::NotEvaluated;
        loop {
            state = self.step(state, actor, rng)?;
            if let Some(captured) = state.outcome() {
                return Ok(captured);
            }
        }
    }

    /// Advances `state` by one transition. `Final` is absorbing.
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: CaptureState,
        actor: &BoundingVolume,
        rng: &mut R,
    ) -> Result<CaptureState> {
        let altitude = actor.altitude();
        let next = match state {
            CaptureState::NotEvaluated if altitude > self.bands.high => {
                CaptureState::Final { captured: true }
            }
            CaptureState::NotEvaluated => CaptureState::HighLayerChecked {
                captured: self.draw(actor, CloudLayer::High, rng)?,
            },
            CaptureState::HighLayerChecked { captured } if captured && altitude <= self.bands.medium => {
                CaptureState::MediumLayerChecked {
                    captured: self.draw(actor, CloudLayer::Medium, rng)?,
                }
            }
            CaptureState::HighLayerChecked { captured }
            | CaptureState::MediumLayerChecked { captured } => CaptureState::Final { captured },
            CaptureState::Final { .. } => state,
        };
        Ok(next)
    }

    /// One layer check: captured with probability `1 - fraction`.
    fn draw<R: Rng + ?Sized>(
        &self,
        actor: &BoundingVolume,
        layer: CloudLayer,
        rng: &mut R,
    ) -> Result<bool> {
        let (latitude, longitude) = (actor.latitude(), actor.longitude());
        let fraction = self.provider.fraction(latitude, longitude, layer)?;
        let fraction = checked_fraction(fraction, latitude, longitude, layer)?;

        let clear = Bernoulli::new(1.0 - fraction).map_err(|e| CollectError::ProviderLookup {
            latitude,
            longitude,
            layer,
            reason: e.to_string(),
        })?;
        Ok(clear.sample(rng))
    }
}

fn checked_fraction(fraction: f64, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64> {
    if fraction.is_finite() && (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(CollectError::ProviderLookup {
            latitude,
            longitude,
            layer,
            reason: format!("cloud fraction {} is not in [0, 1]", fraction),
        })
    }
}
