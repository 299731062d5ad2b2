//! Measurement models for the update step.
//!
//! The filter only needs one capability from a sensor model: the likelihood of an observation given
//! a particle's state. Map representation, ray casting and likelihood-field lookups all live behind
//! that single method. The filter calls it once per particle per update and multiplies the result
//! into the particle's existing weight.
//!
//! [LandmarkRangeModel] is a reference implementation for range-only observations of known point
//! landmarks. It is what the simulator in [crate::sim] uses.
use crate::error::{FilterError, FilterResult};
use crate::{Pose2, StateVector};

use log::trace;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::{self, Display};

/// Generic measurement model trait used by the particle filter update step
pub trait MeasurementModel<const D: usize> {
    /// Observation type interpreted only by this model
    type Observation;
    /// Likelihood `p(observation | state)`; must be finite and non-negative
    fn likelihood(&self, state: &StateVector<D>, observation: &Self::Observation) -> f64;
}

/// Univariate Gaussian probability density
pub fn gaussian_pdf(residual: f64, sigma: f64) -> f64 {
    (-(residual * residual) / (2.0 * sigma * sigma)).exp() / (2.0 * PI * sigma * sigma).sqrt()
}

/// Measured distance to one known landmark
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeObservation {
    /// Index into the model's landmark list
    pub landmark: usize,
    /// Measured range in meters
    pub range: f64,
}
impl Display for RangeObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeObservation(landmark: {}, range: {:.3})", self.landmark, self.range)
    }
}

/// Range-only landmark measurement model
///
/// Each range is scored with a Gaussian around the distance from the particle to the landmark. An
/// optional outlier weight mixes in a uniform density over `[0, max_range]` so that a single bad
/// return cannot zero out every particle.
#[derive(Clone, Debug)]
pub struct LandmarkRangeModel {
    landmarks: Vec<[f64; 2]>,
    range_noise_std: f64,
    outlier_weight: f64,
    max_range: f64,
}
impl LandmarkRangeModel {
    /// Create a model with a pure Gaussian range likelihood
    ///
    /// # Arguments
    /// * `landmarks` - Landmark positions `[x, y]` in meters.
    /// * `range_noise_std` - Standard deviation of a range measurement in meters.
    pub fn new(landmarks: Vec<[f64; 2]>, range_noise_std: f64) -> FilterResult<Self> {
        if !(range_noise_std > 0.0) || !range_noise_std.is_finite() {
            return Err(FilterError::invalid(format!(
                "range noise standard deviation must be positive, got {range_noise_std}"
            )));
        }
        if landmarks.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FilterError::invalid("landmark positions must be finite"));
        }
        Ok(LandmarkRangeModel {
            landmarks,
            range_noise_std,
            outlier_weight: 0.0,
            max_range: f64::INFINITY,
        })
    }
    /// Mix a uniform outlier density into every range likelihood
    ///
    /// # Errors
    /// `InvalidArgument` unless `0 <= outlier_weight < 1` and `max_range` is positive and finite.
    pub fn with_outliers(mut self, outlier_weight: f64, max_range: f64) -> FilterResult<Self> {
        if !(0.0..1.0).contains(&outlier_weight) {
            return Err(FilterError::invalid(format!(
                "outlier weight must be in [0, 1), got {outlier_weight}"
            )));
        }
        if !(max_range > 0.0) || !max_range.is_finite() {
            return Err(FilterError::invalid(format!(
                "maximum range must be positive and finite, got {max_range}"
            )));
        }
        self.outlier_weight = outlier_weight;
        self.max_range = max_range;
        Ok(self)
    }
    pub fn landmarks(&self) -> &[[f64; 2]] {
        &self.landmarks
    }
    pub fn range_noise_std(&self) -> f64 {
        self.range_noise_std
    }
    /// Distance from `state` to landmark `index`, if it exists
    pub fn expected_range(&self, state: &Pose2, index: usize) -> Option<f64> {
        self.landmarks
            .get(index)
            .map(|[x, y]| (x - state[0]).hypot(y - state[1]))
    }
    /// Likelihood of a single range reading
    pub fn range_likelihood(&self, expected: f64, measured: f64) -> f64 {
        let gauss = gaussian_pdf(measured - expected, self.range_noise_std);
        if self.outlier_weight > 0.0 {
            (1.0 - self.outlier_weight) * gauss + self.outlier_weight / self.max_range
        } else {
            gauss
        }
    }
}
impl MeasurementModel<3> for LandmarkRangeModel {
    type Observation = Vec<RangeObservation>;

    /// Product of the per-landmark range likelihoods
    ///
    /// Readings that reference an unknown landmark carry no information and are skipped.
    fn likelihood(&self, state: &Pose2, observation: &Vec<RangeObservation>) -> f64 {
        observation
            .iter()
            .filter_map(|reading| match self.expected_range(state, reading.landmark) {
                Some(expected) => Some(self.range_likelihood(expected, reading.range)),
                None => {
                    trace!("skipping reading of unknown landmark {}", reading.landmark);
                    None
                }
            })
            .product()
    }
}
