//! Error types for index construction, visibility sampling and collection.
//!
//! Every failure that could bias the capture statistic is surfaced as a
//! [`CollectError`]. Nothing in the collection path defaults a missing cloud
//! fraction to 0 or 1, and nothing skips a candidate silently.

use thiserror::Error;

use crate::cloud::CloudLayer;
use crate::volume::Axis;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CollectError>;

#[derive(Debug, Error)]
pub enum CollectError {
    /// A box whose lower corner exceeds its upper corner on some axis
    /// (or has a NaN bound).
    #[error("invalid volume '{label}': {axis} min {min} exceeds max {max}")]
    InvalidVolume {
        label: String,
        axis: Axis,
        min: f64,
        max: f64,
    },

    /// The cloud-fraction provider could not produce a usable fraction.
    #[error("cloud fraction lookup failed at lat {latitude}, lon {longitude} ({layer}): {reason}")]
    ProviderLookup {
        latitude: f64,
        longitude: f64,
        layer: CloudLayer,
        reason: String,
    },

    /// A cloud-fraction grid with no cells, a zero step, or ragged rows.
    #[error("invalid cloud grid: {0}")]
    InvalidGrid(String),

    /// A sampling range in the scenario configuration is empty or non-finite.
    #[error("invalid {name} range [{low}, {high}]")]
    InvalidRange { name: String, low: f64, high: f64 },

    /// Failure while evaluating one candidate pair during collection.
    #[error("collection aborted at target '{target}', actor '{actor}': {source}")]
    Collection {
        target: String,
        actor: String,
        #[source]
        source: Box<CollectError>,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectError {
    /// Attaches the target/actor pair that was being evaluated when `self` occurred.
    pub fn at_pair(self, target: &str, actor: &str) -> Self {
        CollectError::Collection {
            target: target.to_string(),
            actor: actor.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the (target, actor) labels if this error was raised during collection.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self {
            CollectError::Collection { target, actor, .. } => Some((target.as_str(), actor.as_str())),
            _ => None,
        }
    }
}

