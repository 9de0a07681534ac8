//! Axis-aligned bounding volumes for actors and targets.
//!
//! Actors are zero-extent boxes (a point with `min == max` on every axis) and
//! targets are ordinary boxes. Both share one type so that the spatial index
//! can hold either, tagged with a [`VolumeKind`].
//!
//! Coordinates follow the scenario convention: `x` is longitude, `y` is
//! latitude and `z` is altitude.

use std::fmt;

use nalgebra::Point3;
use serde::Serialize;

use crate::error::{CollectError, Result};


/// Coordinate axis, used to report which bound of a volume is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        write!(f, "{}", name)
    }
}

/// What a bounding volume stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VolumeKind {
    Actor,
    Target,
}

/// Axis-aligned 3D box with a kind tag and a label.
///
/// **Context**: Actors and targets are both handed to the collection core as
/// boxes. Actors are points, so their boxes have zero extent; targets span a
/// longitude/latitude rectangle and an altitude band.
///
/// **How it Works**: Stores the lower and upper corners. Construction checks
/// `min <= max` on every axis (NaN fails the check), so a `BoundingVolume` that
/// exists is always well formed. Volumes are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingVolume {
    label: String,
    kind: VolumeKind,
    min: Point3<f64>,
    max: Point3<f64>,
}

impl BoundingVolume {
    /// Creates a volume from its corners, rejecting inverted or NaN bounds.
    pub fn new(
        label: impl Into<String>,
        kind: VolumeKind,
        min: Point3<f64>,
        max: Point3<f64>,
    ) -> Result<Self> {
        let volume = Self {
            label: label.into(),
            kind,
            min,
            max,
        };
        volume.validate()?;
        Ok(volume)
    }

    /// Creates a zero-extent actor volume at `(x, y, z)`.
    pub fn actor(label: impl Into<String>, x: f64, y: f64, z: f64) -> Result<Self> {
        let p = Point3::new(x, y, z);
        Self::new(label, VolumeKind::Actor, p, p)
    }

    /// Creates a target volume spanning `min..=max`.
    pub fn target(label: impl Into<String>, min: Point3<f64>, max: Point3<f64>) -> Result<Self> {
        Self::new(label, VolumeKind::Target, min, max)
    }

    /// Creates a volume from interleaved bounds `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    pub fn from_bounds(label: impl Into<String>, kind: VolumeKind, bounds: [f64; 6]) -> Result<Self> {
        Self::new(
            label,
            kind,
            Point3::new(bounds[0], bounds[1], bounds[2]),
            Point3::new(bounds[3], bounds[4], bounds[5]),
        )
    }

    /// Checks `min <= max` on all three axes.
    fn validate(&self) -> Result<()> {
        for axis in Axis::ALL {
            let (lo, hi) = (self.min[axis.index()], self.max[axis.index()]);
            // written as a negation so that NaN bounds fail too
            if !(lo <= hi) {
                return Err(CollectError::InvalidVolume {
                    label: self.label.clone(),
                    axis,
                    min: lo,
                    max: hi,
                });
            }
        }
        Ok(())
    }

    /// Inclusive AABB overlap: for each axis `a.min <= b.max && b.min <= a.max`.
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        Axis::ALL.iter().all(|axis| {
            let i = axis.index();
            self.min[i] <= other.max[i] && other.min[i] <= self.max[i]
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> VolumeKind {
        self.kind
    }

    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    /// Longitude of the lower corner.
    pub fn longitude(&self) -> f64 {
        self.min.x
    }

    /// Latitude of the lower corner.
    pub fn latitude(&self) -> f64 {
        self.min.y
    }

    /// Altitude of the lower corner.
    pub fn altitude(&self) -> f64 {
        self.min.z
    }

    /// Interleaved bounds `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    pub fn bounds(&self) -> [f64; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }
}
