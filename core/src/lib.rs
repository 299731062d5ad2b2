//! Monte Carlo Localization toolbox
//!
//! This crate provides the core of a Monte Carlo Localization (MCL) system: a particle filter that
//! estimates the pose of a mobile agent from noisy odometry and noisy observations. The belief over
//! the agent's state is represented as a weighted set of particles that is propagated through a
//! stochastic motion model, reweighted against sensor evidence, and resampled when the weights
//! collapse onto too few hypotheses.
//!
//! This crate is not a sensor driver, a map server, or a SLAM system. Map lookups, ray casting and
//! likelihood fields live inside the measurement model that the caller supplies; the outer control
//! loop that decides *when* to predict or update is likewise the caller's responsibility. What the
//! crate does own is the numerically sensitive part: sampling, weighting, normalization and
//! low-variance resampling.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the fixed-size state vectors and covariance matrices.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provide the seeded random number generation used for noise injection and resampling.
//! - [`rayon`](https://crates.io/crates/rayon): Provides optional data parallelism for the per-particle phases.
//!
//! The primary reference text is _Probabilistic Robotics_ by Thrun, Burgard and Fox. The motion model
//! is the `sample_motion_model_odometry` algorithm (Table 5.6) and the resampler is the low variance
//! sampler (Table 4.4). As elsewhere, variables are named for the quantity they represent rather than
//! the symbol used in the book.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [config]: Serializable configuration for the filter and for simulation runs.
//! - [error]: The error type shared by every fallible operation.
//! - [filter]: The particle filter engine and its `Uninitialized -> Ready` lifecycle.
//! - [measurement]: The measurement model capability and a landmark range reference model.
//! - [motion]: The motion model capability and the odometry motion model.
//! - [particle]: Particles and the particle set (normalization, effective sample size, estimates).
//! - [random]: The seedable random source threaded through every stochastic operation.
//! - [resample]: Systematic, stratified and residual resampling.
//! - [sim]: A landmark world simulator for exercising the filter end to end.
//!
//! ## State definition
//!
//! The state of a particle is an `nalgebra` fixed-size column vector of dimension `D`. For planar
//! localization this is the three-state pose
//!
//! $$
//! x = [p_x, p_y, \theta]
//! $$
//!
//! where $p_x$ and $p_y$ are the position in meters in the map frame and $\theta$ is the heading in
//! radians. Angular components are always kept in the half-open range $(-\pi, \pi]$ using [wrap_to_pi].
//! Which components are angular is declared by the motion model, so averaging and covariance
//! computations can treat them as circular quantities.
//!
//! ## Filter cycle
//!
//! ```rust
//! use mcl::config::FilterConfig;
//! use mcl::filter::ParticleFilter;
//! use mcl::measurement::{LandmarkRangeModel, RangeObservation};
//! use mcl::motion::{OdometryMotionModel, OdometryNoise, OdometryReading};
//! use mcl::Pose2;
//!
//! let motion = OdometryMotionModel::new(OdometryNoise::default()).unwrap();
//! let measurement = LandmarkRangeModel::new(vec![[10.0, 0.0], [0.0, 10.0]], 0.5).unwrap();
//! let config = FilterConfig { num_particles: 200, ..FilterConfig::default() };
//! let mut pf = ParticleFilter::new(motion, measurement, config).unwrap();
//!
//! pf.initialize(&Pose2::new(0.0, 0.0, 0.0), 0.1).unwrap();
//! let control = OdometryReading::new(Pose2::new(0.0, 0.0, 0.0), Pose2::new(1.0, 0.0, 0.0)).unwrap();
//! pf.predict(&control).unwrap();
//! let observation = vec![
//!     RangeObservation { landmark: 0, range: 9.0 },
//!     RangeObservation { landmark: 1, range: 10.05 },
//! ];
//! pf.update(&observation).unwrap();
//! let estimate = pf.estimate().unwrap();
//! assert!((estimate[0] - 1.0).abs() < 0.5);
//! ```
pub mod config;
pub mod error;
pub mod filter;
pub mod measurement;
pub mod motion;
pub mod particle;
pub mod random;
pub mod resample;
pub mod sim;

use nalgebra::SVector;
use std::f64::consts::{PI, TAU};

pub use error::{FilterError, FilterResult};

/// State vector of a single particle
pub type StateVector<const D: usize> = SVector<f64, D>;
/// Planar pose `[x, y, heading]`
pub type Pose2 = StateVector<3>;
/// Index of the heading component within a [Pose2]
pub const HEADING: usize = 2;

/// Wrap an angle to the range $(-\pi, \pi]$ radians
///
/// Unlike a conditional add/subtract of $2\pi$, this handles angles any number of turns away from
/// the principal range and is idempotent: wrapping an already wrapped angle returns it unchanged,
/// so repeated calls never oscillate between $-\pi$ and $\pi$.
///
/// # Arguments
/// * `angle` - The angle to be wrapped in radians.
/// # Returns
/// * The wrapped angle, which will be in the range -π (exclusive) to π (inclusive) radians.
/// # Example
/// ```rust
/// use mcl::wrap_to_pi;
/// use std::f64::consts::PI;
/// let angle = 3.0 * PI / 2.0; // radians
/// let wrapped_angle = wrap_to_pi(angle);
/// assert!((wrapped_angle + PI / 2.0).abs() < 1e-12); // 3π/2 radians wrapped to -π/2 radians
/// assert_eq!(wrap_to_pi(-PI), PI);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Smallest signed difference `a - b` between two angles, wrapped to $(-\pi, \pi]$
pub fn angle_difference(a: f64, b: f64) -> f64 {
    wrap_to_pi(a - b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_wrap_to_pi() {
        assert_approx_eq!(wrap_to_pi(3.0 * PI).abs(), PI, 1e-9);
        assert_approx_eq!(wrap_to_pi(-3.0 * PI).abs(), PI, 1e-9);
        assert_eq!(wrap_to_pi(0.0), 0.0);
        assert_eq!(wrap_to_pi(PI), PI);
        assert_eq!(wrap_to_pi(-PI), PI);
        assert_approx_eq!(wrap_to_pi(PI / 2.0 + 4.0 * TAU), PI / 2.0, 1e-9);
    }
    #[test]
    fn test_wrap_to_pi_just_outside_range() {
        let epsilon = 1e-6;
        let above = wrap_to_pi(PI + epsilon);
        let below = wrap_to_pi(-PI - epsilon);
        assert!(above > -PI && above <= PI);
        assert!(below > -PI && below <= PI);
        assert_approx_eq!(above, -PI + epsilon, 1e-12);
        assert_approx_eq!(below, PI - epsilon, 1e-12);
    }
    #[test]
    fn test_wrap_to_pi_is_idempotent() {
        let epsilon = 1e-9;
        for angle in [PI + epsilon, -PI - epsilon, PI, -PI, 7.5, -42.0] {
            let once = wrap_to_pi(angle);
            let mut repeated = once;
            for _ in 0..10 {
                repeated = wrap_to_pi(repeated);
            }
            assert_eq!(once, repeated, "wrap_to_pi oscillated for {angle}");
        }
    }
    #[test]
    fn test_angle_difference() {
        assert_approx_eq!(angle_difference(PI - 0.1, -PI + 0.1), -0.2, 1e-12);
        assert_approx_eq!(angle_difference(0.3, 0.1), 0.2, 1e-12);
    }
}
