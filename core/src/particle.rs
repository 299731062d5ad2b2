//! Particles and the weighted particle set that represents the filter's belief.
//!
//! The set is stored as one contiguous `Vec` of `{state, weight}` records. It is mutated in place
//! during prediction and weighting and replaced wholesale during resampling. Components listed as
//! angular are kept wrapped to $(-\pi, \pi]$ and are averaged as circular quantities.
use crate::error::{FilterError, FilterResult};
use crate::random::RandomSource;
use crate::{StateVector, wrap_to_pi};

use log::{trace, warn};
use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::io;
use std::path::Path;

/// A single state hypothesis and its importance weight
#[derive(Clone, Debug, PartialEq)]
pub struct Particle<const D: usize> {
    pub state: StateVector<D>,
    pub weight: f64,
}
impl<const D: usize> Display for Particle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("state", &self.state.as_slice())
            .field("weight", &self.weight)
            .finish()
    }
}
impl<const D: usize> Particle<D> {
    pub fn new(state: StateVector<D>, weight: f64) -> Particle<D> {
        Particle { state, weight }
    }
}
impl<const D: usize> From<(StateVector<D>, f64)> for Particle<D> {
    fn from(tuple: (StateVector<D>, f64)) -> Self {
        let (state, weight) = tuple;
        Particle::new(state, weight)
    }
}

/// How a single state estimate is extracted from the particle set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStrategy {
    /// Weighted mean, circular for angular components
    #[default]
    WeightedMean,
    /// Unweighted mean, circular for angular components
    UnweightedMean,
    /// State of the particle with the largest weight
    HighestWeight,
}

/// Weighted particle set
#[derive(Clone, Default, PartialEq)]
pub struct ParticleSet<const D: usize> {
    particles: Vec<Particle<D>>,
    angular_dimensions: Vec<usize>,
}
impl<const D: usize> Debug for ParticleSet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        f.debug_struct("ParticleSet")
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("angular_dimensions", &self.angular_dimensions)
            .finish()
    }
}
impl<const D: usize> ParticleSet<D> {
    /// Create an empty set
    ///
    /// # Arguments
    /// * `angular_dimensions` - Indices of the state components that are angles in radians.
    ///
    /// # Errors
    /// `InvalidArgument` if an index is not smaller than `D`.
    pub fn new(angular_dimensions: &[usize]) -> FilterResult<Self> {
        if let Some(bad) = angular_dimensions.iter().find(|&&k| k >= D) {
            return Err(FilterError::invalid(format!(
                "angular dimension {bad} is out of range for a {D}-dimensional state"
            )));
        }
        let mut angular_dimensions = angular_dimensions.to_vec();
        angular_dimensions.sort_unstable();
        angular_dimensions.dedup();
        Ok(ParticleSet {
            particles: Vec::new(),
            angular_dimensions,
        })
    }
    /// Create a set from existing particles
    ///
    /// Angular components are wrapped on the way in. Fails with `InvalidArgument` for an empty
    /// particle list or for a negative or non-finite weight.
    pub fn from_particles(
        mut particles: Vec<Particle<D>>,
        angular_dimensions: &[usize],
    ) -> FilterResult<Self> {
        let mut set = Self::new(angular_dimensions)?;
        if particles.is_empty() {
            return Err(FilterError::invalid("a particle set needs at least one particle"));
        }
        if let Some(p) = particles
            .iter()
            .find(|p| !(p.weight >= 0.0) || !p.weight.is_finite())
        {
            return Err(FilterError::invalid(format!(
                "particle weight must be finite and non-negative, got {}",
                p.weight
            )));
        }
        for particle in &mut particles {
            set.wrap_angles(&mut particle.state);
        }
        set.particles = particles;
        Ok(set)
    }
    /// Replace the current particles with `count` i.i.d. draws from an isotropic Gaussian prior
    ///
    /// Every component of `prior_mean` is perturbed with standard deviation `prior_sigma` and all
    /// weights are set to `1 / count`.
    ///
    /// # Errors
    /// `InvalidArgument` if `count` is zero, `prior_sigma` is negative or not finite, or the prior
    /// mean has a non-finite component.
    pub fn initialize(
        &mut self,
        prior_mean: &StateVector<D>,
        prior_sigma: f64,
        count: usize,
        rng: &mut RandomSource,
    ) -> FilterResult<()> {
        if count == 0 {
            return Err(FilterError::invalid("particle count must be positive"));
        }
        if !(prior_sigma >= 0.0) || !prior_sigma.is_finite() {
            return Err(FilterError::invalid(format!(
                "prior standard deviation must be finite and non-negative, got {prior_sigma}"
            )));
        }
        if prior_mean.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::invalid("prior mean must be finite"));
        }
        let weight = 1.0 / count as f64;
        let mut particles = Vec::with_capacity(count);
        for _ in 0..count {
            let mut state = prior_mean.map(|mean| rng.gaussian(mean, prior_sigma));
            self.wrap_angles(&mut state);
            particles.push(Particle::new(state, weight));
        }
        self.particles = particles;
        trace!("initialized {count} particles with prior sigma {prior_sigma}");
        Ok(())
    }
    /// Number of particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
    pub fn particles(&self) -> &[Particle<D>] {
        &self.particles
    }
    pub fn particles_mut(&mut self) -> &mut [Particle<D>] {
        &mut self.particles
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Particle<D>> {
        self.particles.iter()
    }
    /// Indices of the angular state components
    pub fn angular_dimensions(&self) -> &[usize] {
        &self.angular_dimensions
    }
    pub fn weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.weight).collect()
    }
    pub fn weight_sum(&self) -> f64 {
        self.particles.iter().map(|p| p.weight).sum()
    }
    /// Wrap the angular components of `state` in place
    pub fn wrap_angles(&self, state: &mut StateVector<D>) {
        for &k in &self.angular_dimensions {
            state[k] = wrap_to_pi(state[k]);
        }
    }
    /// Divide every weight by the sum of all weights
    ///
    /// # Errors
    /// `DegenerateDistribution` when the sum is zero or not finite. The weights are left untouched
    /// so the caller can decide between re-initialization and [ParticleSet::reset_uniform_weights].
    pub fn normalize_weights(&mut self) -> FilterResult<()> {
        let weight_sum = self.weight_sum();
        if !(weight_sum > 0.0) || !weight_sum.is_finite() {
            warn!(
                "cannot normalize {} particles: weight sum is {weight_sum}",
                self.particles.len()
            );
            return Err(FilterError::DegenerateDistribution { weight_sum });
        }
        for particle in &mut self.particles {
            particle.weight /= weight_sum;
        }
        Ok(())
    }
    /// Set every weight to `1 / N`
    pub fn reset_uniform_weights(&mut self) {
        let uniform = 1.0 / self.particles.len() as f64;
        for particle in &mut self.particles {
            particle.weight = uniform;
        }
    }
    /// Effective sample size `1 / sum(w_i^2)` over the normalized weights
    ///
    /// Computed as `(sum w)^2 / sum(w^2)` so it is valid before normalization as well. Returns
    /// `0.0` for an empty or degenerate set.
    pub fn effective_sample_size(&self) -> f64 {
        let weight_sum = self.weight_sum();
        let sum_of_squares: f64 = self.particles.iter().map(|p| p.weight * p.weight).sum();
        if weight_sum > 0.0 && weight_sum.is_finite() && sum_of_squares > 0.0 {
            weight_sum * weight_sum / sum_of_squares
        } else {
            0.0
        }
    }
    /// Weighted mean state; angular components use the circular mean
    ///
    /// # Errors
    /// `DegenerateDistribution` when the weight sum is zero or not finite.
    pub fn weighted_mean(&self) -> FilterResult<StateVector<D>> {
        let weight_sum = self.checked_weight_sum()?;
        Ok(self.mean_with(|p| p.weight / weight_sum))
    }
    /// Unweighted mean state; angular components use the circular mean
    ///
    /// The weights are ignored for the average, but an all-zero set is still reported as
    /// `DegenerateDistribution`.
    pub fn unweighted_mean(&self) -> FilterResult<StateVector<D>> {
        self.checked_weight_sum()?;
        let n = self.particles.len() as f64;
        Ok(self.mean_with(|_| 1.0 / n))
    }
    /// State of the particle with the largest weight
    pub fn highest_weight(&self) -> FilterResult<StateVector<D>> {
        self.checked_weight_sum()?;
        self.particles
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|p| p.state)
            .ok_or(FilterError::DegenerateDistribution { weight_sum: 0.0 })
    }
    /// Extract a single state estimate with the given strategy
    pub fn estimate(&self, strategy: EstimateStrategy) -> FilterResult<StateVector<D>> {
        match strategy {
            EstimateStrategy::WeightedMean => self.weighted_mean(),
            EstimateStrategy::UnweightedMean => self.unweighted_mean(),
            EstimateStrategy::HighestWeight => self.highest_weight(),
        }
    }
    /// Weighted covariance about the weighted mean
    ///
    /// Residuals of angular components are wrapped before the outer product.
    pub fn weighted_covariance(&self) -> FilterResult<SMatrix<f64, D, D>> {
        let weight_sum = self.checked_weight_sum()?;
        let mean = self.mean_with(|p| p.weight / weight_sum);
        let mut cov = SMatrix::<f64, D, D>::zeros();
        for particle in &self.particles {
            let mut diff = particle.state - mean;
            self.wrap_angles(&mut diff);
            cov += (particle.weight / weight_sum) * diff * diff.transpose();
        }
        Ok(cov)
    }
    fn checked_weight_sum(&self) -> FilterResult<f64> {
        let weight_sum = self.weight_sum();
        if weight_sum > 0.0 && weight_sum.is_finite() {
            Ok(weight_sum)
        } else {
            Err(FilterError::DegenerateDistribution { weight_sum })
        }
    }
    fn mean_with<F: Fn(&Particle<D>) -> f64>(&self, weight_of: F) -> StateVector<D> {
        let mut mean = StateVector::<D>::zeros();
        let mut sines = StateVector::<D>::zeros();
        let mut cosines = StateVector::<D>::zeros();
        for particle in &self.particles {
            let w = weight_of(particle);
            mean += w * particle.state;
            for &k in &self.angular_dimensions {
                sines[k] += w * particle.state[k].sin();
                cosines[k] += w * particle.state[k].cos();
            }
        }
        for &k in &self.angular_dimensions {
            mean[k] = wrap_to_pi(sines[k].atan2(cosines[k]));
        }
        mean
    }
    /// Write the set to a CSV file, one `s0, .., s{D-1}, weight` row per particle
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header: Vec<String> = (0..D).map(|k| format!("s{k}")).collect();
        header.push("weight".to_string());
        writer.write_record(&header)?;
        for particle in &self.particles {
            let mut row: Vec<String> = particle.state.iter().map(|v| v.to_string()).collect();
            row.push(particle.weight.to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Read a set previously written with [ParticleSet::to_csv]
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        angular_dimensions: &[usize],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut particles = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.len() != D + 1 {
                return Err(Box::new(FilterError::invalid(format!(
                    "expected {} columns per particle, found {}",
                    D + 1,
                    record.len()
                ))));
            }
            let values = record
                .iter()
                .map(|field| field.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()?;
            let state = StateVector::<D>::from_column_slice(&values[..D]);
            particles.push(Particle::new(state, values[D]));
        }
        Ok(Self::from_particles(particles, angular_dimensions)?)
    }
}
