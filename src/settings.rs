use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use log::info;
use serde::{Deserialize, Serialize};

use crate::cloud::{CloudFractionProvider, GriddedCloud, UniformCloud};
use crate::scenario::{ActorRegion, ScenarioConfig, TargetRegion};
use crate::visibility::{AltitudeBands, HIGH_ALTITUDE_THRESHOLD, MEDIUM_ALTITUDE_THRESHOLD};


/// Where cloud fractions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CloudSource {
    /// One constant fraction per layer.
    Uniform { high: f64, medium: f64 },
    /// Nearest-neighbour lookup in JSON grid files, one per layer.
    Grid { high: PathBuf, medium: PathBuf },
}

impl Default for CloudSource {
    fn default() -> Self {
        CloudSource::Uniform {
            high: 0.0,
            medium: 0.0,
        }
    }
}

impl CloudSource {
    /// Builds the provider. Grid files are read here, once per run.
    pub fn provider(&self) -> Result<Box<dyn CloudFractionProvider>> {
        Ok(match self {
            CloudSource::Uniform { high, medium } => Box::new(UniformCloud::new(*high, *medium)),
            CloudSource::Grid { high, medium } => Box::new(
                GriddedCloud::from_json_files(high, medium).with_context(|| {
                    format!(
                        "loading cloud grids {} and {}",
                        high.display(),
                        medium.display()
                    )
                })?,
            ),
        })
    }
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub actor_count: usize,
    pub target_count: usize,
    /// Seeds scenario generation and visibility sampling.
    pub seed: u64,
    pub high_altitude: f64,
    pub medium_altitude: f64,
    pub parallel: bool,
    pub show_progress: bool,
    /// Output directory.
    pub directory: PathBuf,
    pub actor_region: ActorRegion,
    pub target_region: TargetRegion,
    pub cloud: CloudSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            actor_count: 10_000,
            target_count: 100,
            seed: 0,
            high_altitude: HIGH_ALTITUDE_THRESHOLD,
            medium_altitude: MEDIUM_ALTITUDE_THRESHOLD,
            parallel: true,
            show_progress: true,
            directory: PathBuf::from("output"),
            actor_region: ActorRegion::default(),
            target_region: TargetRegion::default(),
            cloud: CloudSource::default(),
        }
    }
}

impl Settings {
    pub fn bands(&self) -> AltitudeBands {
        AltitudeBands {
            high: self.high_altitude,
            medium: self.medium_altitude,
        }
    }

    pub fn scenario(&self) -> ScenarioConfig {
        ScenarioConfig {
            actor_count: self.actor_count,
            target_count: self.target_count,
            actor_region: self.actor_region,
            target_region: self.target_region,
        }
    }

    /// Parses settings from a TOML string; absent keys keep their defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("building configuration")?;
        let settings: Settings = settings
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies command-line overrides.
    pub fn apply_args(&mut self, args: &CliArgs) -> Result<()> {
        if let Some(actors) = args.actors {
            self.actor_count = actors;
        }
        if let Some(targets) = args.targets {
            self.target_count = targets;
        }
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(directory) = &args.directory {
            self.directory = directory.clone();
        }
        if args.serial {
            self.parallel = false;
        }
        if args.no_progress {
            self.show_progress = false;
        }

        match (&args.high_grid, &args.medium_grid) {
            (Some(high), Some(medium)) => {
                self.cloud = CloudSource::Grid {
                    high: high.clone(),
                    medium: medium.clone(),
                };
            }
            (None, None) => {
                if args.high_cloud.is_some() || args.medium_cloud.is_some() {
                    let (high, medium) = match self.cloud {
                        CloudSource::Uniform { high, medium } => (high, medium),
                        CloudSource::Grid { .. } => (0.0, 0.0),
                    };
                    self.cloud = CloudSource::Uniform {
                        high: args.high_cloud.unwrap_or(high),
                        medium: args.medium_cloud.unwrap_or(medium),
                    };
                }
            }
            _ => bail!("--high-grid and --medium-grid must be given together"),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.high_altitude.is_finite() && self.medium_altitude.is_finite(),
            "Altitude thresholds must be finite"
        );
        ensure!(
            self.medium_altitude <= self.high_altitude,
            "Medium altitude threshold ({}) must not exceed the high threshold ({})",
            self.medium_altitude,
            self.high_altitude
        );
        if let CloudSource::Uniform { high, medium } = self.cloud {
            for (layer, fraction) in [("high", high), ("medium", medium)] {
                ensure!(
                    (0.0..=1.0).contains(&fraction),
                    "Uniform {} cloud fraction must be in [0, 1], got {}",
                    layer,
                    fraction
                );
            }
        }
        let regions = [
            ("actor longitude", self.actor_region.longitude),
            ("actor latitude", self.actor_region.latitude),
            ("actor altitude", self.actor_region.altitude),
            ("target longitude", self.target_region.longitude),
            ("target latitude", self.target_region.latitude),
            ("target altitude", self.target_region.altitude),
            ("target half extent", self.target_region.half_extent),
        ];
        for (name, range) in regions {
            range.uniform(name)?;
        }
        Ok(())
    }
}

/// Loads `config/default.toml` only, with no environment or CLI overrides.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    load_from(&root.join("config/default.toml"), false)
}

/// Loads the configuration file, then environment overrides (`WXCOLLECT_*`),
/// then command-line overrides.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        info!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        info!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let mut settings = load_from(&config_file, true)?;
    settings.apply_args(&CliArgs::parse())?;
    settings.validate()?;

    Ok(settings)
}

fn load_from(path: &Path, with_env: bool) -> Result<Settings> {
    let mut builder = Config::builder().add_source(File::from(path).required(true));
    if with_env {
        builder = builder.add_source(
            Environment::with_prefix("wxcollect")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
    }
    let settings: Settings = builder
        .build()
        .with_context(|| format!("loading configuration from {:?}", path))?
        .try_deserialize()
        .context("deserializing configuration")?;
    settings.validate()?;
    Ok(settings)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the WXCOLLECT_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("WXCOLLECT_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    // Walk upward from the executable until a "config" directory turns up
    let exe_path = env::current_exe().context("locating the current executable")?;
    let mut dir = exe_path.parent();
    while let Some(current) = dir {
        if current.join("config").is_dir() {
            return Ok(current.to_path_buf());
        }
        dir = current.parent();
    }
    bail!("Could not find project root directory (set WXCOLLECT_ROOT_DIR)")
}

#[derive(Parser, Debug)]
#[command(version, about = "wxcollect - cloud-obscured collection of actors in target volumes")]
pub struct CliArgs {
    /// Number of actors to place.
    #[arg(long)]
    actors: Option<usize>,

    /// Number of target volumes to place.
    #[arg(long)]
    targets: Option<usize>,

    /// Random seed for scenario generation and visibility sampling.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Constant high-cloud fraction in [0, 1].
    #[arg(long)]
    high_cloud: Option<f64>,

    /// Constant medium-cloud fraction in [0, 1].
    #[arg(long)]
    medium_cloud: Option<f64>,

    /// JSON grid of high-cloud fractions (requires --medium-grid).
    #[arg(long)]
    high_grid: Option<PathBuf>,

    /// JSON grid of medium-cloud fractions (requires --high-grid).
    #[arg(long)]
    medium_grid: Option<PathBuf>,

    /// Evaluate targets on a single thread.
    #[arg(long)]
    serial: bool,

    /// Do not draw a progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Output directory.
    #[arg(short = 'o', long)]
    directory: Option<PathBuf>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cloud = match &self.cloud {
            CloudSource::Uniform { high, medium } => {
                format!("uniform (high {:.3}, medium {:.3})", high, medium)
            }
            CloudSource::Grid { high, medium } => {
                format!("grid ({}, {})", high.display(), medium.display())
            }
        };
        write!(
            f,
            "Settings:
  - Actors: {}
  - Targets: {}
  - Seed: {}
  - High Altitude: {:.1}
  - Medium Altitude: {:.1}
  - Cloud: {}
  - Parallel: {}
  - Output: {}
  ",
            self.actor_count,
            self.target_count,
            self.seed,
            self.high_altitude,
            self.medium_altitude,
            cloud,
            self.parallel,
            self.directory.display(),
        )
    }
}
