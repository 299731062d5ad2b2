//! Resampling of a weighted particle set.
//!
//! All strategies draw `N` particle indices with replacement, with probability proportional to the
//! particle weights, and produce an unweighted set (every weight `1/N`). The filter uses systematic
//! (low variance) resampling by default: a single uniform offset `r` in `[0, 1/N)` and the evenly
//! spaced pointers `r + i/N` are swept over the cumulative weights with one monotone index. This is
//! O(N) and, for a fixed offset, fully deterministic.
//!
//! Weights do not have to be normalized beforehand; the cumulative distribution is normalized on
//! the fly and clamped to exactly one from the last particle with non-zero weight on, so rounding can
//! never leave that bucket unreachable nor hand the leftover mass to trailing zero-weight particles.
use crate::error::{FilterError, FilterResult};
use crate::particle::{Particle, ParticleSet};
use crate::random::RandomSource;

use log::debug;
use serde::{Deserialize, Serialize};

/// Resampling algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Low variance sampler: one random offset, evenly spaced pointers
    #[default]
    Systematic,
    /// One independent uniform draw inside each of the `N` strata
    Stratified,
    /// Deterministic `floor(N w_i)` copies, remainder drawn systematically from the residuals
    Residual,
}

impl ResamplingStrategy {
    /// Draw `weights.len()` indices proportional to `weights`
    pub fn indices(&self, weights: &[f64], rng: &mut RandomSource) -> FilterResult<Vec<usize>> {
        match self {
            ResamplingStrategy::Systematic => systematic_resample(weights, rng),
            ResamplingStrategy::Stratified => stratified_resample(weights, rng),
            ResamplingStrategy::Residual => residual_resample(weights, rng),
        }
    }
    /// Build a new, uniformly weighted set from `particles`
    pub fn resample<const D: usize>(
        &self,
        particles: &ParticleSet<D>,
        rng: &mut RandomSource,
    ) -> FilterResult<ParticleSet<D>> {
        let indices = self.indices(&particles.weights(), rng)?;
        let uniform = 1.0 / indices.len() as f64;
        let source = particles.particles();
        let resampled: Vec<Particle<D>> = indices
            .iter()
            .map(|&i| Particle::new(source[i].state, uniform))
            .collect();
        debug!(
            "{:?} resampling kept {} distinct of {} particles",
            self,
            count_distinct(&indices),
            indices.len()
        );
        ParticleSet::from_particles(resampled, particles.angular_dimensions())
    }
}

/// Resample with the default (systematic) strategy
pub fn resample<const D: usize>(
    particles: &ParticleSet<D>,
    rng: &mut RandomSource,
) -> FilterResult<ParticleSet<D>> {
    ResamplingStrategy::Systematic.resample(particles, rng)
}

/// Normalized cumulative weights, clamped to exactly `1.0` from the last non-zero weight on
///
/// # Errors
/// `InvalidArgument` for an empty slice or a negative weight, `DegenerateDistribution` when the
/// weights sum to zero or to a non-finite value.
pub fn cumulative_weights(weights: &[f64]) -> FilterResult<Vec<f64>> {
    if weights.is_empty() {
        return Err(FilterError::invalid("cannot resample an empty particle set"));
    }
    if let Some(w) = weights.iter().find(|w| **w < 0.0) {
        return Err(FilterError::invalid(format!(
            "particle weights must be non-negative, got {w}"
        )));
    }
    let weight_sum: f64 = weights.iter().sum();
    if !(weight_sum > 0.0) || !weight_sum.is_finite() {
        return Err(FilterError::DegenerateDistribution { weight_sum });
    }
    let mut cumulative: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w / weight_sum;
            Some(*acc)
        })
        .collect();
    // Clamp from the last particle with mass so trailing zero weights keep an empty interval
    if let Some(k) = weights.iter().rposition(|w| *w > 0.0) {
        cumulative[k..].fill(1.0);
    }
    Ok(cumulative)
}

/// Sweep sorted pointers in `[0, 1)` over the cumulative weights with a single monotone index
///
/// The index never moves past the first bucket that reaches `1.0`.
fn sweep<I: IntoIterator<Item = f64>>(cumulative: &[f64], pointers: I) -> Vec<usize> {
    let last = cumulative
        .iter()
        .position(|c| *c >= 1.0)
        .unwrap_or(cumulative.len() - 1);
    let mut index = 0;
    pointers
        .into_iter()
        .map(|u| {
            while index < last && u >= cumulative[index] {
                index += 1;
            }
            index
        })
        .collect()
}

/// Systematic resampling indices for a given offset
///
/// The `i`-th output is the particle whose cumulative weight interval contains `offset + i/N`.
/// Identical weights and offset always produce the identical index sequence.
///
/// # Errors
/// `InvalidArgument` unless `0 <= offset < 1/N`; see also [cumulative_weights].
pub fn systematic_indices(weights: &[f64], offset: f64) -> FilterResult<Vec<usize>> {
    systematic_indices_n(weights, weights.len(), offset)
}

fn systematic_indices_n(weights: &[f64], count: usize, offset: f64) -> FilterResult<Vec<usize>> {
    let cumulative = cumulative_weights(weights)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let step = 1.0 / count as f64;
    if !(0.0..step).contains(&offset) {
        return Err(FilterError::invalid(format!(
            "systematic offset must be in [0, {step}), got {offset}"
        )));
    }
    Ok(sweep(
        &cumulative,
        (0..count).map(|i| offset + i as f64 * step),
    ))
}

/// Systematic (low variance) resampling
pub fn systematic_resample(weights: &[f64], rng: &mut RandomSource) -> FilterResult<Vec<usize>> {
    let n = weights.len().max(1);
    let offset = rng.uniform(0.0, 1.0 / n as f64);
    systematic_indices(weights, offset)
}

/// Stratified resampling: one independent draw per stratum `[i/N, (i+1)/N)`
pub fn stratified_resample(weights: &[f64], rng: &mut RandomSource) -> FilterResult<Vec<usize>> {
    let cumulative = cumulative_weights(weights)?;
    let n = weights.len() as f64;
    let pointers: Vec<f64> = (0..weights.len())
        .map(|i| (i as f64 + rng.uniform(0.0, 1.0)) / n)
        .collect();
    Ok(sweep(&cumulative, pointers))
}

/// Residual resampling
///
/// Particle `i` is first copied `floor(N w_i)` times; the remaining slots are filled by systematic
/// resampling over the fractional residuals.
pub fn residual_resample(weights: &[f64], rng: &mut RandomSource) -> FilterResult<Vec<usize>> {
    let cumulative = cumulative_weights(weights)?;
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    let mut residuals = Vec::with_capacity(n);
    let mut previous = 0.0;
    for (i, &c) in cumulative.iter().enumerate() {
        let expected = (c - previous) * n as f64;
        previous = c;
        let copies = expected.floor() as usize;
        indices.extend(std::iter::repeat_n(i, copies.min(n - indices.len())));
        residuals.push(expected - copies as f64);
    }
    let remaining = n - indices.len();
    if remaining > 0 {
        let step = 1.0 / remaining as f64;
        let offset = rng.uniform(0.0, step);
        match systematic_indices_n(&residuals, remaining, offset) {
            Ok(extra) => indices.extend(extra),
            // Rounding left no residual mass; fall back to the full weights
            Err(FilterError::DegenerateDistribution { .. }) => {
                indices.extend(systematic_indices_n(weights, remaining, offset)?)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(indices)
}

fn count_distinct(indices: &[usize]) -> usize {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}
