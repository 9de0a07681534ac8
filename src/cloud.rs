//! Cloud-fraction providers.
//!
//! The visibility sampler asks a [`CloudFractionProvider`] for the fraction of
//! the sky covered by one cloud layer at a latitude/longitude. Where that
//! number comes from is the provider's business: this module ships a constant
//! provider (useful for stubs and what-if runs) and a gridded provider that
//! does nearest-neighbour lookup on a regular latitude/longitude grid, the way
//! forecast cloud-cover fields are laid out.
//!
//! Providers are shared read-only across rayon workers, so the trait requires
//! `Send + Sync`.

use std::{fmt, fs, path::Path};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{CollectError, Result};


/// Cloud layer consulted by the visibility sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudLayer {
    High,
    Medium,
}

impl fmt::Display for CloudLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudLayer::High => write!(f, "high cloud"),
            CloudLayer::Medium => write!(f, "medium cloud"),
        }
    }
}

/// Source of cloud-fraction values in `[0, 1]`.
///
/// Implementations own nearest-location semantics and dataset selection.
/// They should return an error rather than a made-up value when a location
/// cannot be resolved; the sampler additionally rejects non-finite and
/// out-of-range answers.
pub trait CloudFractionProvider: Send + Sync {
    fn fraction(&self, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64>;
}

impl<P: CloudFractionProvider + ?Sized> CloudFractionProvider for &P {
    fn fraction(&self, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64> {
        (**self).fraction(latitude, longitude, layer)
    }
}

impl<P: CloudFractionProvider + ?Sized> CloudFractionProvider for Box<P> {
    fn fraction(&self, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64> {
        (**self).fraction(latitude, longitude, layer)
    }
}

/// Same fraction everywhere, one value per layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformCloud {
    pub high: f64,
    pub medium: f64,
}

impl UniformCloud {
    pub fn new(high: f64, medium: f64) -> Self {
        Self { high, medium }
    }

    /// Clear sky on both layers.
    pub fn clear() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl CloudFractionProvider for UniformCloud {
    fn fraction(&self, _latitude: f64, _longitude: f64, layer: CloudLayer) -> Result<f64> {
        Ok(match layer {
            CloudLayer::High => self.high,
            CloudLayer::Medium => self.medium,
        })
    }
}

/// On-disk form of a [`CloudGrid`].
#[derive(Debug, Deserialize)]
struct CloudGridFile {
    lat_start: f64,
    lat_step: f64,
    lon_start: f64,
    lon_step: f64,
    values: Vec<Vec<f32>>,
}

/// Regular latitude/longitude grid of cloud fractions.
///
/// **Context**: Forecast cloud-cover products are published on regular grids
/// (0.25 degree for the global models the simulation was built around) and
/// are sampled at the grid point nearest to each actor.
///
/// **How it Works**: Row `i` sits at latitude `lat_start + i * lat_step` and
/// column `j` at longitude `lon_start + j * lon_step`. Steps may be negative
/// for grids stored north to south. Lookups round to the nearest row and
/// column and clamp to the grid edge when the location lies outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudGrid {
    lat_start: f64,
    lat_step: f64,
    lon_start: f64,
    lon_step: f64,
    values: Array2<f32>,
}

impl CloudGrid {
    pub fn new(
        lat_start: f64,
        lat_step: f64,
        lon_start: f64,
        lon_step: f64,
        values: Array2<f32>,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(CollectError::InvalidGrid("grid has no cells".to_string()));
        }
        for (name, step) in [("latitude", lat_step), ("longitude", lon_step)] {
            if !step.is_finite() || step == 0.0 {
                return Err(CollectError::InvalidGrid(format!(
                    "{} step must be finite and non-zero, got {}",
                    name, step
                )));
            }
        }
        if !lat_start.is_finite() || !lon_start.is_finite() {
            return Err(CollectError::InvalidGrid("grid origin is not finite".to_string()));
        }

        Ok(Self {
            lat_start,
            lat_step,
            lon_start,
            lon_step,
            values,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CloudGridFile = serde_json::from_str(json)?;
        let rows = file.values.len();
        let cols = file.values.first().map_or(0, Vec::len);
        if file.values.iter().any(|row| row.len() != cols) {
            return Err(CollectError::InvalidGrid(
                "rows have different lengths".to_string(),
            ));
        }
        let flat: Vec<f32> = file.values.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| CollectError::InvalidGrid(e.to_string()))?;

        Self::new(file.lat_start, file.lat_step, file.lon_start, file.lon_step, values)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// (rows, columns) of the grid.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Row and column of the grid point nearest to `(latitude, longitude)`.
    pub fn nearest_index(&self, latitude: f64, longitude: f64) -> (usize, usize) {
        let (rows, cols) = self.shape();
        (
            nearest_on_axis(latitude, self.lat_start, self.lat_step, rows),
            nearest_on_axis(longitude, self.lon_start, self.lon_step, cols),
        )
    }

    pub fn value_at(&self, latitude: f64, longitude: f64) -> f32 {
        self.values[self.nearest_index(latitude, longitude)]
    }
}

fn nearest_on_axis(coord: f64, start: f64, step: f64, len: usize) -> usize {
    let position = ((coord - start) / step).round();
    position.clamp(0.0, (len - 1) as f64) as usize
}

/// Gridded provider holding one grid per cloud layer.
#[derive(Debug, Clone)]
pub struct GriddedCloud {
    pub high: CloudGrid,
    pub medium: CloudGrid,
}

impl GriddedCloud {
    pub fn new(high: CloudGrid, medium: CloudGrid) -> Self {
        Self { high, medium }
    }

    pub fn from_json_files(high: impl AsRef<Path>, medium: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(
            CloudGrid::from_json_file(high)?,
            CloudGrid::from_json_file(medium)?,
        ))
    }
}

impl CloudFractionProvider for GriddedCloud {
    fn fraction(&self, latitude: f64, longitude: f64, layer: CloudLayer) -> Result<f64> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CollectError::ProviderLookup {
                latitude,
                longitude,
                layer,
                reason: "location is not finite".to_string(),
            });
        }
        let grid = match layer {
            CloudLayer::High => &self.high,
            CloudLayer::Medium => &self.medium,
        };
        Ok(grid.value_at(latitude, longitude) as f64)
    }
}
