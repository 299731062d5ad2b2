//! Serializable configuration for the particle filter and for simulation runs.
//!
//! [FilterConfig] is everything the engine needs besides its two models. [SimulationConfig] bundles
//! a filter configuration with the motion noise, prior, landmark world and trajectory used by
//! [crate::sim]. Both can be read from and written to JSON, YAML or TOML; the format is picked from
//! the file extension.
use crate::error::{FilterError, FilterResult};
use crate::motion::OdometryNoise;
use crate::particle::EstimateStrategy;
use crate::resample::ResamplingStrategy;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Default seed value for reproducible runs
fn default_seed() -> u64 {
    42
}

/// Particle filter engine configuration
///
/// # Example
/// ```rust
/// use mcl::config::FilterConfig;
/// let config = FilterConfig { num_particles: 1000, ..FilterConfig::default() };
/// assert_eq!(config.resample_threshold, 0.5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of particles drawn by `initialize`
    pub num_particles: usize,
    /// Resample when the effective sample size drops below `resample_threshold * N`
    pub resample_threshold: f64,
    pub resampling: ResamplingStrategy,
    pub estimate: EstimateStrategy,
    /// Seed of the filter's random source
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Evaluate the motion and measurement models on the rayon thread pool
    pub parallel: bool,
}
impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: 500,
            resample_threshold: 0.5,
            resampling: ResamplingStrategy::default(),
            estimate: EstimateStrategy::default(),
            seed: default_seed(),
            parallel: false,
        }
    }
}
impl FilterConfig {
    /// # Errors
    /// `InvalidArgument` for a zero particle count or a threshold outside `[0, 1]`.
    pub fn validate(&self) -> FilterResult<()> {
        if self.num_particles == 0 {
            return Err(FilterError::invalid("particle count must be positive"));
        }
        if !(0.0..=1.0).contains(&self.resample_threshold) {
            return Err(FilterError::invalid(format!(
                "resample threshold must be in [0, 1], got {}",
                self.resample_threshold
            )));
        }
        Ok(())
    }
}

/// Gaussian prior the particle set is drawn from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Prior pose `[x, y, heading]`
    pub mean: [f64; 3],
    /// Per-component standard deviation
    pub sigma: f64,
}
impl Default for PriorConfig {
    fn default() -> Self {
        PriorConfig {
            mean: [0.0, 0.0, 0.0],
            sigma: 1.0,
        }
    }
}

/// Known landmarks and the range sensor observing them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Landmark positions `[x, y]` in meters
    pub landmarks: Vec<[f64; 2]>,
    /// Landmarks further away than this are not observed
    pub max_range: f64,
    pub range_noise_std: f64,
    /// Weight of the uniform outlier density in the range likelihood
    pub outlier_weight: f64,
}
impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            landmarks: vec![
                [-10.0, 0.0],
                [10.0, 0.0],
                [10.0, 20.0],
                [-10.0, 20.0],
                [0.0, 10.0],
            ],
            max_range: 25.0,
            range_noise_std: 0.3,
            outlier_weight: 0.05,
        }
    }
}

/// Simulated trajectory and odometry corruption
///
/// The agent drives a constant speed, constant turn rate path starting from the prior mean.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub steps: usize,
    /// Time step in seconds
    pub dt: f64,
    /// Forward speed in m/s
    pub speed: f64,
    /// Turn rate in rad/s
    pub yaw_rate: f64,
    /// Noise used to corrupt the odometry stream handed to the filter
    pub odometry_noise: OdometryNoise,
    /// Seed of the scenario generator, independent of the filter seed
    pub seed: u64,
}
impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            steps: 100,
            dt: 1.0,
            speed: 1.0,
            yaw_rate: 0.1,
            odometry_noise: OdometryNoise {
                alpha1: 0.01,
                alpha2: 0.01,
                alpha3: 0.05,
                alpha4: 0.05,
            },
            seed: 7,
        }
    }
}

/// Complete description of a simulated localization run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub filter: FilterConfig,
    /// Noise assumed by the filter's motion model
    pub motion_noise: OdometryNoise,
    pub prior: PriorConfig,
    pub world: WorldConfig,
    pub scenario: ScenarioConfig,
}

impl SimulationConfig {
    /// Check every section before a run is started
    pub fn validate(&self) -> FilterResult<()> {
        self.filter.validate()?;
        self.motion_noise.validate()?;
        self.scenario.odometry_noise.validate()?;
        if !(self.prior.sigma >= 0.0) || !self.prior.sigma.is_finite() {
            return Err(FilterError::invalid(format!(
                "prior sigma must be finite and non-negative, got {}",
                self.prior.sigma
            )));
        }
        if self.world.landmarks.is_empty() {
            return Err(FilterError::invalid("the world needs at least one landmark"));
        }
        if !(self.world.max_range > 0.0) || !self.world.max_range.is_finite() {
            return Err(FilterError::invalid(format!(
                "maximum range must be positive and finite, got {}",
                self.world.max_range
            )));
        }
        if !(self.scenario.dt > 0.0) || !self.scenario.dt.is_finite() {
            return Err(FilterError::invalid(format!(
                "time step must be positive, got {}",
                self.scenario.dt
            )));
        }
        Ok(())
    }
    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        read_toml(path)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(unsupported(p)),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(unsupported(p)),
        }
    }
}

fn read_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> io::Result<T> {
    let mut s = String::new();
    File::open(path)?.read_to_string(&mut s)?;
    toml::from_str(&s).map_err(io::Error::other)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn unsupported(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unsupported configuration file extension: {}", path.display()),
    )
}
